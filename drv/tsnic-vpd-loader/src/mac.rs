// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use core::fmt;
use drv_tsnic_vpd::MAC_LEN;
use rand_core::RngCore;

/// I/G bit: set for group (multicast) addresses.
const MULTICAST: u8 = 1 << 0;
/// U/L bit: set for locally administered addresses.
const LOCAL: u8 = 1 << 1;

/// An IEEE 802 MAC address.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct MacAddress(pub [u8; MAC_LEN]);

impl MacAddress {
    /// A random unicast address with the locally administered bit set.
    pub fn random_local(rng: &mut impl RngCore) -> Self {
        let mut octets = [0u8; MAC_LEN];
        rng.fill_bytes(&mut octets);
        octets[0] &= !MULTICAST;
        octets[0] |= LOCAL;
        Self(octets)
    }

    pub fn octets(&self) -> [u8; MAC_LEN] {
        self.0
    }

    pub fn is_multicast(&self) -> bool {
        self.0[0] & MULTICAST != 0
    }

    pub fn is_locally_administered(&self) -> bool {
        self.0[0] & LOCAL != 0
    }
}

impl From<[u8; MAC_LEN]> for MacAddress {
    fn from(octets: [u8; MAC_LEN]) -> Self {
        Self(octets)
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}
