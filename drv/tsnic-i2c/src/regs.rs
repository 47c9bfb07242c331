// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Register map of the card's I2C master.

use bitflags::bitflags;
use core::ptr::NonNull;

/// Byte offset of the controller's register block inside the mapped window.
pub const CSR_OFFSET: usize = 0x0200_0100;

/// Writing this to [`Register::Isr`] acknowledges every pending status bit.
pub const ISR_ACK_ALL: u32 = 0xff;

/// The controller's 32-bit registers, by byte offset from [`CSR_OFFSET`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(usize)]
pub enum Register {
    /// Transfer command FIFO
    TfrCmd = 0x00,
    /// Received data FIFO
    RxData = 0x04,
    /// Control
    Ctrl = 0x08,
    /// Interrupt status enable
    Iser = 0x0c,
    /// Interrupt status
    Isr = 0x10,
    /// Core status
    Status = 0x14,
    TfrCmdFifoLvl = 0x18,
    RxDataFifoLvl = 0x1c,
    SclLow = 0x20,
    SclHigh = 0x24,
    SdaHold = 0x28,
}

impl Register {
    pub const fn offset(self) -> usize {
        self as usize
    }
}

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct Control: u32 {
        /// Core enable
        const EN = 1 << 0;
        /// Fast mode when set; we leave it clear and time the bus ourselves
        const BUS_SPEED = 1 << 1;
    }
}

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct InterruptStatus: u32 {
        /// The command FIFO can accept another transfer command
        const TX_READY = 1 << 0;
        /// At least one byte is waiting in the receive FIFO
        const RX_READY = 1 << 1;
        const NACK_DET = 1 << 2;
        const ARBLOST_DET = 1 << 3;
        const RX_OVER = 1 << 4;
    }
}

/// Raw access to the register block.
///
/// Both operations take `&mut self`: reading [`Register::RxData`] pops the
/// receive FIFO, so even reads change hardware state.
pub trait Registers {
    fn read(&mut self, reg: Register) -> u32;
    fn write(&mut self, reg: Register, value: u32);
}

/// The register block as it appears in a mapped PCI BAR.
pub struct MappedRegisters {
    base: NonNull<u8>,
}

impl MappedRegisters {
    /// Wraps the mapped window starting at `window`.
    ///
    /// # Safety
    ///
    /// `window` must point to a device mapping that covers
    /// `CSR_OFFSET + Register::SdaHold.offset() + 4` bytes, is suitably
    /// aligned for 32-bit accesses, stays mapped for as long as the returned
    /// value exists, and is not accessed by anything else in the meantime.
    pub unsafe fn new(window: NonNull<u8>) -> Self {
        Self { base: window }
    }

    fn register(&self, reg: Register) -> *mut u32 {
        self.base
            .as_ptr()
            .wrapping_add(CSR_OFFSET + reg.offset())
            .cast::<u32>()
    }
}

impl Registers for MappedRegisters {
    fn read(&mut self, reg: Register) -> u32 {
        // Safety: in bounds, aligned and exclusively ours per `new`.
        unsafe { self.register(reg).read_volatile() }
    }

    fn write(&mut self, reg: Register, value: u32) {
        // Safety: as for `read`.
        unsafe { self.register(reg).write_volatile(value) }
    }
}
