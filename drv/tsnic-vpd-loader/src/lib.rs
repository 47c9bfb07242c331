// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Attach-time VPD handling for the TSN NIC.
//!
//! Reads the card's VPD and settles on the Ethernet address that the switch
//! and TSE functions of the card are handed. When the EEPROM cannot be read
//! or holds a layout we don't know, the card still comes up, with a random
//! locally administered address instead of the burned-in one.

#![cfg_attr(not(test), no_std)]

mod mac;

pub use mac::MacAddress;

use drv_tsnic_i2c::{I2cController, Registers};
use drv_tsnic_vpd::{Vpd, VpdError, EEPROM_ADDRESS};
use embedded_hal::blocking::delay::DelayUs;
use rand_core::RngCore;
use ringbuf::*;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Bus address of the VPD EEPROM.
    pub address: u8,
    /// Number of full load sequences to try; zero is treated as one.
    pub attempts: u32,
    /// Pause between attempts.
    pub retry_delay_us: u32,
}

impl LoaderConfig {
    /// One attempt: a card that fails to answer at attach gets a random
    /// address rather than holding up bring-up.
    pub const DEFAULT: Self = Self {
        address: EEPROM_ADDRESS,
        attempts: 1,
        retry_delay_us: 500_000,
    };
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Where the card's Ethernet address came from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MacOrigin {
    /// Read from the VPD EEPROM.
    BurnedIn,
    /// Made up because the VPD could not supply one.
    LocallyAssigned(VpdError),
}

#[derive(Clone, Debug)]
pub struct CardIdentity {
    pub vpd: Vpd,
    pub mac: MacAddress,
    pub origin: MacOrigin,
}

#[derive(Copy, Clone, PartialEq)]
enum Trace {
    None,
    LoadFailed { attempt: u32, err: VpdError },
    BurnedIn(MacAddress),
    LocallyAssigned(MacAddress),
}

ringbuf!(Trace, 8, Trace::None);

/// Loads the VPD (retrying per `config`) and resolves the card's Ethernet
/// address, falling back to `rng` when the VPD has none to offer.
pub fn read_vpd<R, D, G>(
    i2c: &mut I2cController<R, D>,
    rng: &mut G,
    config: &LoaderConfig,
) -> CardIdentity
where
    R: Registers,
    D: DelayUs<u32>,
    G: RngCore,
{
    let attempts = config.attempts.max(1);
    let mut attempt = 1;

    let vpd = loop {
        let vpd = Vpd::load(i2c, config.address);
        match vpd.status() {
            Ok(()) => break vpd,
            Err(err) => {
                ringbuf_entry!(Trace::LoadFailed { attempt, err });
                if attempt >= attempts {
                    break vpd;
                }
            }
        }
        i2c.delay_mut().delay_us(config.retry_delay_us);
        attempt += 1;
    };

    let (mac, origin) = match vpd.mac_address() {
        Ok(octets) => {
            let mac = MacAddress(octets);
            ringbuf_entry!(Trace::BurnedIn(mac));
            (mac, MacOrigin::BurnedIn)
        }
        Err(err) => {
            let mac = MacAddress::random_local(rng);
            ringbuf_entry!(Trace::LocallyAssigned(mac));
            (mac, MacOrigin::LocallyAssigned(err))
        }
    };

    CardIdentity { vpd, mac, origin }
}
