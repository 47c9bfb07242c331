// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A driver for the memory-mapped I2C master on the TSN NIC.
//!
//! The controller is a byte-at-a-time state machine: software writes one
//! transfer command per bus phase into the command FIFO and collects one
//! byte per read phase from the receive FIFO. There are no interrupts in
//! play here; every wait is a bounded busy-poll on the interrupt status
//! register, so an absent or wedged device turns into an
//! [`I2cError::Timeout`] after roughly 100 ms instead of a hang.

#![cfg_attr(not(any(test, feature = "fake")), no_std)]

mod command;
mod poll;
mod regs;

#[cfg(any(test, feature = "fake"))]
pub mod fake;

pub use command::{Direction, TransferCommand};
pub use poll::{poll_until, PollConfig, PollTimeout};
pub use regs::{
    Control, InterruptStatus, MappedRegisters, Register, Registers,
    CSR_OFFSET, ISR_ACK_ALL,
};

use embedded_hal::blocking::delay::DelayUs;
use ringbuf::*;

/// Board-level timing for the controller.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct I2cConfig {
    /// Frequency of the clock feeding the controller core.
    pub core_clock_hz: u64,
    /// SCL low and high periods are each `core_clock_hz / scl_hz` cycles.
    pub scl_hz: u32,
    /// SDA hold time after the falling edge of SCL.
    pub sda_hold_ns: u32,
    /// Time the core needs after being enabled before it takes commands.
    pub settle_us: u32,
    /// Time the core needs after each command word is written.
    pub write_settle_us: u32,
    pub poll: PollConfig,
}

impl I2cConfig {
    /// The TSN NIC runs its core at 100 MHz.
    pub const TSNIC: Self = Self {
        core_clock_hz: 100_000_000,
        scl_hz: 200_000,
        sda_hold_ns: 300,
        settle_us: 10,
        write_settle_us: 1,
        poll: PollConfig::DEFAULT,
    };

    /// Converts the configuration into register values.
    pub fn timing(&self) -> BusTiming {
        let scl = cycles(self.core_clock_hz, u64::from(self.scl_hz));
        let hold = self
            .core_clock_hz
            .saturating_mul(u64::from(self.sda_hold_ns))
            / 1_000_000_000;
        BusTiming {
            scl_low: scl,
            scl_high: scl,
            sda_hold: u32::try_from(hold).unwrap_or(u32::MAX),
        }
    }
}

impl Default for I2cConfig {
    fn default() -> Self {
        Self::TSNIC
    }
}

fn cycles(clock_hz: u64, divisor: u64) -> u32 {
    u32::try_from(clock_hz / divisor.max(1)).unwrap_or(u32::MAX)
}

/// Values programmed into `SclLow`, `SclHigh` and `SdaHold`, in core clock
/// cycles.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BusTiming {
    pub scl_low: u32,
    pub scl_high: u32,
    pub sda_hold: u32,
}

/// The status bit a poll was waiting on.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReadyBit {
    Transmit,
    Receive,
}

impl ReadyBit {
    fn flag(self) -> InterruptStatus {
        match self {
            Self::Transmit => InterruptStatus::TX_READY,
            Self::Receive => InterruptStatus::RX_READY,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum I2cError {
    /// The ready bit never asserted within the poll budget.
    Timeout(ReadyBit),
}

#[derive(Copy, Clone, PartialEq)]
enum Trace {
    None,
    Configured(BusTiming),
    Command(u32),
    Rx(u8),
    Timeout(ReadyBit),
    Disabled,
}

ringbuf!(Trace, 16, Trace::None);

pub struct I2cController<R, D> {
    registers: R,
    delay: D,
    config: I2cConfig,
}

impl<R: Registers, D: DelayUs<u32>> I2cController<R, D> {
    /// Takes ownership of the register block; nothing is touched until
    /// [`configure`](Self::configure).
    pub fn new(registers: R, delay: D, config: I2cConfig) -> Self {
        Self {
            registers,
            delay,
            config,
        }
    }

    pub fn config(&self) -> &I2cConfig {
        &self.config
    }

    pub fn registers(&self) -> &R {
        &self.registers
    }

    pub fn delay(&self) -> &D {
        &self.delay
    }

    /// The delay source, for callers pacing retries between transactions.
    pub fn delay_mut(&mut self) -> &mut D {
        &mut self.delay
    }

    /// Gives back the register block and delay source.
    pub fn into_parts(self) -> (R, D) {
        (self.registers, self.delay)
    }

    /// Brings the bus up: the core is held disabled while timing is
    /// programmed and stale status is acknowledged, then enabled and given
    /// time to settle. Must run before the first transfer.
    pub fn configure(&mut self) {
        let timing = self.config.timing();

        self.disable();

        self.registers.write(Register::SclLow, timing.scl_low);
        self.registers.write(Register::SclHigh, timing.scl_high);
        self.registers.write(Register::SdaHold, timing.sda_hold);
        self.acknowledge_all();

        self.registers.write(Register::Ctrl, Control::EN.bits());
        ringbuf_entry!(Trace::Configured(timing));

        self.delay.delay_us(self.config.settle_us);
    }

    /// Turns the core off.
    pub fn disable(&mut self) {
        self.registers.write(Register::Ctrl, Control::empty().bits());
        ringbuf_entry!(Trace::Disabled);
    }

    /// Clears every pending bit in the interrupt status register.
    pub fn acknowledge_all(&mut self) {
        self.registers.write(Register::Isr, ISR_ACK_ALL);
    }

    /// Queues one transfer command once the command FIFO can take it.
    ///
    /// On timeout nothing is written. The caller must not issue the next
    /// command before this returns.
    pub fn send(&mut self, cmd: TransferCommand) -> Result<(), I2cError> {
        self.wait_for(ReadyBit::Transmit)?;

        let word = cmd.bits();
        self.registers.write(Register::TfrCmd, word);
        ringbuf_entry!(Trace::Command(word));

        self.delay.delay_us(self.config.write_settle_us);
        Ok(())
    }

    /// Collects one received byte once it has arrived.
    pub fn recv(&mut self) -> Result<u8, I2cError> {
        self.wait_for(ReadyBit::Receive)?;

        let byte = (self.registers.read(Register::RxData) & 0xff) as u8;
        ringbuf_entry!(Trace::Rx(byte));
        Ok(byte)
    }

    fn wait_for(&mut self, bit: ReadyBit) -> Result<(), I2cError> {
        let registers = &mut self.registers;
        let flag = bit.flag();

        poll_until(&self.config.poll, &mut self.delay, || {
            InterruptStatus::from_bits_truncate(registers.read(Register::Isr))
                .contains(flag)
        })
        .map_err(|PollTimeout| {
            ringbuf_entry!(Trace::Timeout(bit));
            I2cError::Timeout(bit)
        })
    }
}
