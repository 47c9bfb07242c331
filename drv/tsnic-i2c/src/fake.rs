// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Host-side doubles for the register block and the delay source.
//!
//! `FakeRegisters` behaves like the controller with an EEPROM on the bus:
//! TX_READY is up whenever the command FIFO would accept a word, RX_READY is
//! up while a requested byte is waiting, and each read of `RxData` hands out
//! the next byte of the injected image. Either ready bit can be made to stick
//! low after a chosen number of transfers, and every register write is kept
//! in order for later inspection.

use std::vec::Vec;

use embedded_hal::blocking::delay::DelayUs;

use crate::command::{RSTA, RW_D, STA, STO};
use crate::regs::{InterruptStatus, Register, Registers};

/// Bits above the data byte that the fake sets in `RxData`, so callers that
/// forget to mask show up in tests.
const RX_DATA_NOISE: u32 = 0xa5a5_a500;

#[derive(Default)]
pub struct FakeRegisters {
    eeprom: Vec<u8>,
    values: [u32; 11],
    /// Every register write, in the order it happened.
    pub writes: Vec<(Register, u32)>,
    /// Number of `Isr` reads, i.e. poll checks.
    pub isr_reads: usize,
    commands: usize,
    requested: usize,
    delivered: usize,
    reading: bool,
    tx_stall_after: Option<usize>,
    rx_stall_after: Option<usize>,
}

impl FakeRegisters {
    /// A controller whose EEPROM returns `image`, then 0xff once exhausted.
    pub fn with_eeprom(image: &[u8]) -> Self {
        Self {
            eeprom: image.to_vec(),
            ..Self::default()
        }
    }

    /// TX_READY never asserts again once `n` commands have been accepted.
    pub fn stall_tx_after(mut self, n: usize) -> Self {
        self.tx_stall_after = Some(n);
        self
    }

    /// RX_READY never asserts again once `n` bytes have been delivered.
    pub fn stall_rx_after(mut self, n: usize) -> Self {
        self.rx_stall_after = Some(n);
        self
    }

    /// Command words written to `TfrCmd`, in order.
    pub fn commands(&self) -> Vec<u32> {
        self.writes
            .iter()
            .filter(|(reg, _)| *reg == Register::TfrCmd)
            .map(|&(_, value)| value)
            .collect()
    }

    /// Number of bytes handed out through `RxData`.
    pub fn delivered(&self) -> usize {
        self.delivered
    }

    /// Total number of register accesses the fake has seen.
    pub fn accesses(&self) -> usize {
        self.writes.len() + self.isr_reads + self.delivered
    }

    fn tx_ready(&self) -> bool {
        self.tx_stall_after.map_or(true, |n| self.commands < n)
    }

    fn rx_ready(&self) -> bool {
        self.requested > self.delivered
            && self.rx_stall_after.map_or(true, |n| self.delivered < n)
    }

    fn command(&mut self, word: u32) {
        self.commands += 1;
        if word & (STA | RSTA) != 0 {
            self.reading = word & RW_D != 0;
        } else if self.reading {
            self.requested += 1;
        }
        if word & STO != 0 {
            self.reading = false;
        }
    }
}

impl Registers for FakeRegisters {
    fn read(&mut self, reg: Register) -> u32 {
        match reg {
            Register::Isr => {
                self.isr_reads += 1;
                let mut isr = InterruptStatus::empty();
                isr.set(InterruptStatus::TX_READY, self.tx_ready());
                isr.set(InterruptStatus::RX_READY, self.rx_ready());
                isr.bits()
            }
            Register::RxData => {
                let byte = self.eeprom.get(self.delivered).copied();
                self.delivered += 1;
                RX_DATA_NOISE | u32::from(byte.unwrap_or(0xff))
            }
            _ => self.values[reg.offset() / 4],
        }
    }

    fn write(&mut self, reg: Register, value: u32) {
        self.writes.push((reg, value));
        if reg == Register::TfrCmd {
            self.command(value);
        }
        self.values[reg.offset() / 4] = value;
    }
}

/// Delay source that only keeps score.
#[derive(Copy, Clone, Debug, Default)]
pub struct FakeDelay {
    pub elapsed_us: u64,
    pub calls: u64,
}

impl DelayUs<u32> for FakeDelay {
    fn delay_us(&mut self, us: u32) {
        self.elapsed_us += u64::from(us);
        self.calls += 1;
    }
}
