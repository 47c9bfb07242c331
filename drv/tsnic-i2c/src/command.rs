// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Transfer commands: one bus phase per word written to
//! [`Register::TfrCmd`](crate::Register::TfrCmd).

/// Read/write bit of the address phase (set for reads).
pub(crate) const RW_D: u32 = 1 << 0;
const AD_SHIFT: u32 = 1;
const AD_MASK: u32 = 0xfe;
pub(crate) const STO: u32 = 1 << 8;
pub(crate) const RSTA: u32 = 1 << 9;
pub(crate) const STA: u32 = 1 << 10;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    Write,
    Read,
}

/// A single transfer command.
///
/// The controller consumes one of these per byte on the wire: address
/// phases carry the 7-bit target address and direction, data phases carry
/// the byte to write (ignored by the hardware while reading, where each
/// command simply requests the next byte).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TransferCommand {
    /// START followed by the address phase.
    Start { address: u8, direction: Direction },
    /// Repeated START (no STOP in between) followed by the address phase.
    RepeatedStart { address: u8, direction: Direction },
    /// A data phase that keeps the bus held.
    Continue(u8),
    /// The last data phase of a transaction; STOP follows it.
    Stop(u8),
}

impl TransferCommand {
    /// Encodes the command as the hardware's 32-bit command word.
    pub fn bits(self) -> u32 {
        match self {
            Self::Start { address, direction } => {
                STA | address_phase(address, direction)
            }
            Self::RepeatedStart { address, direction } => {
                RSTA | address_phase(address, direction)
            }
            Self::Continue(byte) => u32::from(byte),
            Self::Stop(byte) => STO | u32::from(byte),
        }
    }
}

impl From<TransferCommand> for u32 {
    fn from(cmd: TransferCommand) -> Self {
        cmd.bits()
    }
}

fn address_phase(address: u8, direction: Direction) -> u32 {
    let rw = match direction {
        Direction::Write => 0,
        Direction::Read => RW_D,
    };
    ((u32::from(address) << AD_SHIFT) & AD_MASK) | rw
}
