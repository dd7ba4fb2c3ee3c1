// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Bluetooth hardware address.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Reasons a hardware address string is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("expected 6 colon-separated octets, found {0}")]
    OctetCount(usize),

    #[error("octet {index} ('{octet}') is not two hex digits")]
    BadOctet { index: usize, octet: String },
}

/// Six-octet hardware address of the managed device.
///
/// Parsing accepts `XX:XX:XX:XX:XX:XX` in either case; display is always
/// the upper-case canonical form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address([u8; 6]);

impl Address {
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        if parts.len() != 6 {
            return Err(AddressError::OctetCount(parts.len()));
        }

        let mut octets = [0u8; 6];
        for (index, part) in parts.iter().enumerate() {
            // from_str_radix tolerates a leading '+', so check the digits ourselves
            if part.len() != 2 || !part.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(AddressError::BadOctet {
                    index,
                    octet: part.to_string(),
                });
            }
            octets[index] = u8::from_str_radix(part, 16).map_err(|_| AddressError::BadOctet {
                index,
                octet: part.to_string(),
            })?;
        }

        Ok(Self::new(octets))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

impl From<Address> for bluer::Address {
    fn from(address: Address) -> Self {
        bluer::Address::new(address.octets())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_canonical() {
        let addr: Address = "AA:BB:CC:DD:EE:FF".parse().unwrap();
        assert_eq!(addr.octets(), [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        assert_eq!(addr.to_string(), "AA:BB:CC:DD:EE:FF");
        assert_eq!(addr, Address::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]));
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        let lower: Address = "0a:1b:2c:3d:4e:5f".parse().unwrap();
        let upper: Address = "0A:1B:2C:3D:4E:5F".parse().unwrap();
        assert_eq!(lower, upper);
        assert_eq!(lower.to_string(), "0A:1B:2C:3D:4E:5F");
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let addr: Address = "  00:11:22:33:44:55\n".parse().unwrap();
        assert_eq!(addr.to_string(), "00:11:22:33:44:55");
    }

    #[test]
    fn test_rejects_malformed() {
        assert_eq!(
            "AA:BB:CC:DD:EE".parse::<Address>(),
            Err(AddressError::OctetCount(5))
        );
        assert_eq!(
            "AA:BB:CC:DD:EE:FF:00".parse::<Address>(),
            Err(AddressError::OctetCount(7))
        );
        assert!(matches!(
            "AA:BB:CC:DD:EE:GG".parse::<Address>(),
            Err(AddressError::BadOctet { index: 5, .. })
        ));
        assert!(matches!(
            "A:BB:CC:DD:EE:FF".parse::<Address>(),
            Err(AddressError::BadOctet { index: 0, .. })
        ));
        assert!(matches!(
            "+A:BB:CC:DD:EE:FF".parse::<Address>(),
            Err(AddressError::BadOctet { index: 0, .. })
        ));
        assert!("AA-BB-CC-DD-EE-FF".parse::<Address>().is_err());
        assert!("".parse::<Address>().is_err());
    }

    #[test]
    fn test_bluer_conversion() {
        let addr: Address = "AA:BB:CC:DD:EE:FF".parse().unwrap();
        let native: bluer::Address = addr.into();
        assert_eq!(native.to_string(), "AA:BB:CC:DD:EE:FF");
    }
}
