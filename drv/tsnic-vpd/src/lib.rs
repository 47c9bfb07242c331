// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Vital product data (VPD) of the TSN NIC.
//!
//! The card carries a 256-byte EEPROM at address 0x51 on its I2C master.
//! [`Vpd::load`] pulls the whole image over in one transaction when the card
//! is attached; afterwards the returned [`Vpd`] is immutable and decodes the
//! MAC address and asset tag without touching the hardware again.
//!
//! The first byte of the image selects the layout. Only format 0 exists:
//!
//! | offset | length | contents                         |
//! |--------|--------|----------------------------------|
//! | 0      | 1      | format id (0)                    |
//! | 1      | 6      | MAC address                      |
//! | 7      | 10     | ASCII asset tag, NUL padded      |
//!
//! If the load fails, the error is kept in place of the image and every
//! accessor returns it.

#![cfg_attr(not(test), no_std)]

use drv_tsnic_i2c::{
    Direction, I2cController, I2cError, Registers, TransferCommand,
};
use embedded_hal::blocking::delay::DelayUs;
use ringbuf::*;
use static_assertions::const_assert;
use zerocopy::{FromZeros, IntoBytes};

/// Bus address of the VPD EEPROM.
pub const EEPROM_ADDRESS: u8 = 0x51;
pub const EEPROM_SIZE: usize = 256;
/// The image is always read from the first byte.
pub const READ_OFFSET: u8 = 0;
pub const MAC_LEN: usize = 6;
pub const ASSET_TAG_LEN: usize = 10;

const FORMAT_ZERO: u8 = 0;

// Byte indices are reported as u8 in `LoadStep`.
const_assert!(EEPROM_SIZE <= u8::MAX as usize + 1);
const_assert!(1 + MAC_LEN + ASSET_TAG_LEN <= EEPROM_SIZE);

/// The part of the read sequence that failed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LoadStep {
    /// START plus device address, write direction
    SelectDevice,
    /// Writing the EEPROM's internal read offset
    SetOffset,
    /// Repeated START plus device address, read direction
    RepeatedStart,
    /// Requesting byte `n` of the image
    Request(u8),
    /// Collecting byte `n` of the image
    Receive(u8),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VpdError {
    /// The controller never became ready during the given step.
    Timeout(LoadStep),
    /// The image's format id is not one we can decode.
    UnrecognizedFormat(u8),
    /// The caller's buffer cannot hold the decoded value.
    InsufficientCapacity { needed: usize, provided: usize },
}

fn failed_at(step: LoadStep) -> impl FnOnce(I2cError) -> VpdError {
    move |err| match err {
        I2cError::Timeout(_) => VpdError::Timeout(step),
    }
}

#[derive(Clone, Debug)]
#[derive(
    zerocopy_derive::FromBytes,
    zerocopy_derive::IntoBytes,
    zerocopy_derive::Immutable,
    zerocopy_derive::KnownLayout,
    zerocopy_derive::Unaligned,
)]
#[repr(C)]
struct Image {
    format: u8,
    body: [u8; EEPROM_SIZE - 1],
}

/// Format 0 view of [`Image::body`].
#[derive(
    zerocopy_derive::FromBytes,
    zerocopy_derive::IntoBytes,
    zerocopy_derive::Immutable,
    zerocopy_derive::KnownLayout,
    zerocopy_derive::Unaligned,
)]
#[repr(C)]
struct FormatZero {
    mac: [u8; MAC_LEN],
    asset_tag: [u8; ASSET_TAG_LEN],
    reserved: [u8; EEPROM_SIZE - 1 - MAC_LEN - ASSET_TAG_LEN],
}

enum Layout<'a> {
    Zero(&'a FormatZero),
}

#[derive(Copy, Clone, PartialEq)]
enum Trace {
    None,
    Load(u8),
    Loaded { format: u8 },
    LoadFailed(VpdError),
}

ringbuf!(Trace, 8, Trace::None);

/// The card's VPD, read once at attach.
#[derive(Clone, Debug)]
pub struct Vpd {
    contents: Result<Image, VpdError>,
}

impl Vpd {
    /// Reads the whole EEPROM at `address` through `i2c`.
    ///
    /// This brings the bus up from scratch, so it doubles as the bus
    /// initialization for the attach; the controller is left disabled
    /// whether or not the read succeeds. The first failing step ends the
    /// sequence and is recorded in the returned value; there is no retry.
    pub fn load<R: Registers, D: DelayUs<u32>>(
        i2c: &mut I2cController<R, D>,
        address: u8,
    ) -> Self {
        ringbuf_entry!(Trace::Load(address));

        let mut image = Image::new_zeroed();
        let result = read_image(i2c, address, image.as_mut_bytes());
        i2c.disable();

        let contents = match result {
            Ok(()) => {
                ringbuf_entry!(Trace::Loaded {
                    format: image.format
                });
                Ok(image)
            }
            Err(e) => {
                ringbuf_entry!(Trace::LoadFailed(e));
                Err(e)
            }
        };
        Self { contents }
    }

    /// Wraps an image that was obtained some other way, e.g. a dump.
    pub fn from_image(raw: [u8; EEPROM_SIZE]) -> Self {
        let image: Image = zerocopy::transmute!(raw);
        Self {
            contents: Ok(image),
        }
    }

    /// Outcome of the load.
    pub fn status(&self) -> Result<(), VpdError> {
        self.image().map(|_| ())
    }

    /// The raw EEPROM image; never available after a failed load.
    pub fn raw(&self) -> Result<&[u8; EEPROM_SIZE], VpdError> {
        let image = self.image()?;
        let raw: &[u8; EEPROM_SIZE] = zerocopy::transmute_ref!(image);
        Ok(raw)
    }

    /// The image's format id.
    pub fn format(&self) -> Result<u8, VpdError> {
        Ok(self.image()?.format)
    }

    /// The burned-in MAC address.
    pub fn mac_address(&self) -> Result<[u8; MAC_LEN], VpdError> {
        match self.layout()? {
            Layout::Zero(fields) => Ok(fields.mac),
        }
    }

    /// Copies the asset tag into `out` followed by a NUL, returning the
    /// number of bytes written.
    ///
    /// `out` must have room for [`ASSET_TAG_LEN`] + 1 bytes; if it does not,
    /// it is left untouched. Bytes past the terminator are never written.
    pub fn asset_tag(&self, out: &mut [u8]) -> Result<usize, VpdError> {
        let tag = match self.layout()? {
            Layout::Zero(fields) => &fields.asset_tag,
        };

        let needed = tag.len() + 1;
        if out.len() < needed {
            return Err(VpdError::InsufficientCapacity {
                needed,
                provided: out.len(),
            });
        }

        out[..tag.len()].copy_from_slice(tag);
        out[tag.len()] = 0;
        Ok(needed)
    }

    fn image(&self) -> Result<&Image, VpdError> {
        self.contents.as_ref().map_err(|e| *e)
    }

    fn layout(&self) -> Result<Layout<'_>, VpdError> {
        let image = self.image()?;
        match image.format {
            FORMAT_ZERO => {
                let fields: &FormatZero =
                    zerocopy::transmute_ref!(&image.body);
                Ok(Layout::Zero(fields))
            }
            other => Err(VpdError::UnrecognizedFormat(other)),
        }
    }
}

/// Start, offset, repeated start, then one request/receive pair per byte
/// with STOP on the last request.
fn read_image<R: Registers, D: DelayUs<u32>>(
    i2c: &mut I2cController<R, D>,
    address: u8,
    buf: &mut [u8],
) -> Result<(), VpdError> {
    i2c.configure();
    i2c.acknowledge_all();

    i2c.send(TransferCommand::Start {
        address,
        direction: Direction::Write,
    })
    .map_err(failed_at(LoadStep::SelectDevice))?;

    i2c.send(TransferCommand::Continue(READ_OFFSET))
        .map_err(failed_at(LoadStep::SetOffset))?;

    // No STOP before switching direction, so nobody else can take the bus
    // between the offset write and the read.
    i2c.send(TransferCommand::RepeatedStart {
        address,
        direction: Direction::Read,
    })
    .map_err(failed_at(LoadStep::RepeatedStart))?;

    let last = buf.len().saturating_sub(1);
    for (i, slot) in buf.iter_mut().enumerate() {
        let index = i as u8;
        let request = if i == last {
            TransferCommand::Stop(0)
        } else {
            TransferCommand::Continue(0)
        };

        i2c.send(request)
            .map_err(failed_at(LoadStep::Request(index)))?;
        *slot = i2c.recv().map_err(failed_at(LoadStep::Receive(index)))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use drv_tsnic_i2c::fake::{FakeDelay, FakeRegisters};
    use drv_tsnic_i2c::{I2cConfig, Register};

    type FakeI2c = I2cController<FakeRegisters, FakeDelay>;

    fn i2c(regs: FakeRegisters) -> FakeI2c {
        I2cController::new(regs, FakeDelay::default(), I2cConfig::TSNIC)
    }

    fn counting_image() -> [u8; EEPROM_SIZE] {
        let mut image = [0u8; EEPROM_SIZE];
        for (i, b) in image.iter_mut().enumerate() {
            *b = i as u8;
        }
        image
    }

    fn format_zero_image() -> [u8; EEPROM_SIZE] {
        let mut image = [0xffu8; EEPROM_SIZE];
        image[0] = 0;
        image[1..7].copy_from_slice(&[0x02, 0x11, 0x22, 0x33, 0x44, 0x55]);
        image[7..17].copy_from_slice(b"SN0001234\0");
        image
    }

    #[track_caller]
    fn check_failed_load(regs: FakeRegisters, expected: VpdError) {
        let mut i2c = i2c(regs);
        let vpd = Vpd::load(&mut i2c, EEPROM_ADDRESS);

        assert_eq!(vpd.status(), Err(expected));
        assert_eq!(vpd.raw(), Err(expected));
        assert_eq!(vpd.mac_address(), Err(expected));
        let mut tag = [0u8; 11];
        assert_eq!(vpd.asset_tag(&mut tag), Err(expected));
        assert_eq!(tag, [0u8; 11]);

        // The controller is switched off on the way out.
        assert_eq!(i2c.registers().writes.last(), Some(&(Register::Ctrl, 0)));
    }

    #[test]
    fn load_reads_whole_image_in_order() {
        let image = counting_image();
        let mut i2c = i2c(FakeRegisters::with_eeprom(&image));
        let vpd = Vpd::load(&mut i2c, EEPROM_ADDRESS);

        assert_eq!(vpd.status(), Ok(()));
        assert_eq!(vpd.raw(), Ok(&image));
        assert_eq!(i2c.registers().delivered(), EEPROM_SIZE);
    }

    #[test]
    fn load_command_sequence() {
        let mut i2c = i2c(FakeRegisters::with_eeprom(&counting_image()));
        Vpd::load(&mut i2c, EEPROM_ADDRESS).status().unwrap();

        let commands = i2c.registers().commands();
        assert_eq!(commands.len(), 3 + EEPROM_SIZE);
        assert_eq!(commands[..3], [0x4a2, 0x000, 0x2a3]);
        assert!(commands[3..3 + EEPROM_SIZE - 1].iter().all(|&c| c == 0));
        assert_eq!(commands.last(), Some(&0x100));
    }

    #[test]
    fn load_initializes_bus_before_transfers() {
        let mut i2c = i2c(FakeRegisters::with_eeprom(&counting_image()));
        Vpd::load(&mut i2c, EEPROM_ADDRESS).status().unwrap();

        let writes = &i2c.registers().writes;
        assert_eq!(
            writes[..7],
            [
                (Register::Ctrl, 0),
                (Register::SclLow, 500),
                (Register::SclHigh, 500),
                (Register::SdaHold, 30),
                (Register::Isr, 0xff),
                (Register::Ctrl, 1),
                (Register::Isr, 0xff),
            ]
        );
        assert_eq!(writes[7], (Register::TfrCmd, 0x4a2));
        assert_eq!(writes.last(), Some(&(Register::Ctrl, 0)));
    }

    #[test]
    fn device_never_ready() {
        check_failed_load(
            FakeRegisters::default().stall_tx_after(0),
            VpdError::Timeout(LoadStep::SelectDevice),
        );
    }

    #[test]
    fn stall_during_offset() {
        check_failed_load(
            FakeRegisters::default().stall_tx_after(1),
            VpdError::Timeout(LoadStep::SetOffset),
        );
    }

    #[test]
    fn stall_during_repeated_start() {
        check_failed_load(
            FakeRegisters::default().stall_tx_after(2),
            VpdError::Timeout(LoadStep::RepeatedStart),
        );
    }

    #[test]
    fn stall_while_requesting() {
        check_failed_load(
            FakeRegisters::with_eeprom(&counting_image())
                .stall_tx_after(3 + 17),
            VpdError::Timeout(LoadStep::Request(17)),
        );
    }

    #[test]
    fn stall_on_final_request() {
        check_failed_load(
            FakeRegisters::with_eeprom(&counting_image())
                .stall_tx_after(3 + EEPROM_SIZE - 1),
            VpdError::Timeout(LoadStep::Request(255)),
        );
    }

    #[test]
    fn stall_while_receiving() {
        check_failed_load(
            FakeRegisters::with_eeprom(&format_zero_image()).stall_rx_after(5),
            VpdError::Timeout(LoadStep::Receive(5)),
        );
    }

    #[test]
    fn stall_aborts_remaining_sequence() {
        let mut i2c = i2c(FakeRegisters::default().stall_rx_after(0));
        let vpd = Vpd::load(&mut i2c, EEPROM_ADDRESS);

        assert_eq!(vpd.status(), Err(VpdError::Timeout(LoadStep::Receive(0))));
        // Start, offset, repeated start and the first request only.
        assert_eq!(i2c.registers().commands().len(), 4);
    }

    #[test]
    fn mac_from_format_zero() {
        let vpd = Vpd::from_image(format_zero_image());
        assert_eq!(vpd.format(), Ok(0));
        assert_eq!(
            vpd.mac_address(),
            Ok([0x02, 0x11, 0x22, 0x33, 0x44, 0x55])
        );
    }

    #[test]
    fn unknown_format_is_rejected() {
        let mut image = format_zero_image();
        image[0] = 1;
        let vpd = Vpd::from_image(image);

        assert_eq!(vpd.mac_address(), Err(VpdError::UnrecognizedFormat(1)));
        let mut tag = [0u8; 11];
        assert_eq!(
            vpd.asset_tag(&mut tag),
            Err(VpdError::UnrecognizedFormat(1))
        );
        // The raw image is still there for whoever wants to look.
        assert_eq!(vpd.raw().map(|r| r[0]), Ok(1));
    }

    #[test]
    fn blank_eeprom_is_unrecognized() {
        // Reads past the end of the fake's image come back as 0xff, like an
        // erased part.
        let mut i2c = i2c(FakeRegisters::default());
        let vpd = Vpd::load(&mut i2c, EEPROM_ADDRESS);

        assert_eq!(vpd.status(), Ok(()));
        assert_eq!(vpd.mac_address(), Err(VpdError::UnrecognizedFormat(0xff)));
    }

    #[test]
    fn asset_tag_is_terminated() {
        let vpd = Vpd::from_image(format_zero_image());
        let mut tag = [0xeeu8; 11];

        assert_eq!(vpd.asset_tag(&mut tag), Ok(11));
        assert_eq!(&tag[..10], b"SN0001234\0");
        assert_eq!(tag[10], 0);
    }

    #[test]
    fn asset_tag_leaves_tail_alone() {
        let mut image = format_zero_image();
        image[7..17].copy_from_slice(b"ABCDEFGHIJ");
        let vpd = Vpd::from_image(image);
        let mut tag = [0xeeu8; 32];

        assert_eq!(vpd.asset_tag(&mut tag), Ok(11));
        assert_eq!(&tag[..11], b"ABCDEFGHIJ\0");
        assert!(tag[11..].iter().all(|&b| b == 0xee));
    }

    #[test]
    fn asset_tag_needs_room_for_terminator() {
        let vpd = Vpd::from_image(format_zero_image());
        let mut tag = [0xeeu8; 10];

        assert_eq!(
            vpd.asset_tag(&mut tag),
            Err(VpdError::InsufficientCapacity {
                needed: 11,
                provided: 10
            })
        );
        assert_eq!(tag, [0xee; 10]);
    }

    #[test]
    fn accessors_do_no_io() {
        let mut i2c = i2c(FakeRegisters::with_eeprom(&format_zero_image()));
        let vpd = Vpd::load(&mut i2c, EEPROM_ADDRESS);
        let accesses = i2c.registers().accesses();

        let mac = vpd.mac_address();
        let mut first = [0u8; 11];
        let tag = vpd.asset_tag(&mut first);
        for _ in 0..8 {
            let mut again = [0u8; 11];
            assert_eq!(vpd.mac_address(), mac);
            assert_eq!(vpd.asset_tag(&mut again), tag);
            assert_eq!(again, first);
        }
        assert_eq!(i2c.registers().accesses(), accesses);
    }

    #[test]
    fn cards_load_in_parallel() {
        std::thread::scope(|s| {
            for card in 0..8u8 {
                s.spawn(move || {
                    let mut image = format_zero_image();
                    image[6] = card;
                    for _ in 0..50 {
                        let mut i2c = i2c(FakeRegisters::with_eeprom(&image));
                        let vpd = Vpd::load(&mut i2c, EEPROM_ADDRESS);
                        assert_eq!(
                            vpd.mac_address(),
                            Ok([0x02, 0x11, 0x22, 0x33, 0x44, card])
                        );
                    }
                });
            }
        });
    }

    proptest::proptest! {
        #[test]
        fn image_arrives_byte_for_byte(
            bytes in proptest::collection::vec(proptest::num::u8::ANY, EEPROM_SIZE)
        ) {
            let mut i2c = i2c(FakeRegisters::with_eeprom(&bytes));
            let vpd = Vpd::load(&mut i2c, EEPROM_ADDRESS);

            let raw = vpd.raw().unwrap();
            proptest::prop_assert_eq!(&raw[..], &bytes[..]);
        }
    }
}
