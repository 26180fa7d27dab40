use crate::error::{DisbursementError, Result};
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const FRIENDLY_LEN: usize = 36;
const TAG_BOUNCEABLE: u8 = 0x11;
const TAG_NON_BOUNCEABLE: u8 = 0x51;
const TAG_TESTNET: u8 = 0x80;

/// Account identifier: a workchain plus a 32-byte account hash.
///
/// Accepts the raw form (`0:4884fb...`) and the 48-character user-friendly
/// form (`EQBIhPuW...`). Two addresses are equal when workchain and hash
/// match, whatever textual form they were parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    pub workchain: i8,
    pub hash: [u8; 32],
}

impl Address {
    pub const fn new(workchain: i8, hash: [u8; 32]) -> Self {
        Self { workchain, hash }
    }

    fn parse_raw(s: &str) -> Result<Self> {
        let (wc, hash_hex) = s
            .split_once(':')
            .ok_or_else(|| invalid(s, "missing workchain separator"))?;
        let workchain = wc
            .parse::<i8>()
            .map_err(|_| invalid(s, "workchain is not a small integer"))?;
        let bytes = hex::decode(hash_hex).map_err(|_| invalid(s, "hash is not hex"))?;
        let hash: [u8; 32] = bytes
            .try_into()
            .map_err(|_| invalid(s, "hash must be 32 bytes"))?;
        Ok(Self { workchain, hash })
    }

    fn parse_friendly(s: &str) -> Result<Self> {
        let bytes = if s.contains(['-', '_']) {
            URL_SAFE.decode(s)
        } else {
            STANDARD.decode(s)
        }
        .map_err(|_| invalid(s, "not valid base64"))?;
        if bytes.len() != FRIENDLY_LEN {
            return Err(invalid(s, "decoded length must be 36 bytes"));
        }
        let tag = bytes[0] & !TAG_TESTNET;
        if tag != TAG_BOUNCEABLE && tag != TAG_NON_BOUNCEABLE {
            return Err(invalid(s, "unknown address tag"));
        }
        let expected = crc16(&bytes[..34]);
        let actual = u16::from_be_bytes([bytes[34], bytes[35]]);
        if expected != actual {
            return Err(invalid(s, "checksum mismatch"));
        }
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes[2..34]);
        Ok(Self {
            workchain: bytes[1] as i8,
            hash,
        })
    }

    /// Renders the user-friendly base64url form.
    pub fn to_friendly(&self, bounceable: bool, testnet: bool) -> String {
        let mut bytes = Vec::with_capacity(FRIENDLY_LEN);
        let mut tag = if bounceable {
            TAG_BOUNCEABLE
        } else {
            TAG_NON_BOUNCEABLE
        };
        if testnet {
            tag |= TAG_TESTNET;
        }
        bytes.push(tag);
        bytes.push(self.workchain as u8);
        bytes.extend_from_slice(&self.hash);
        let crc = crc16(&bytes);
        bytes.extend_from_slice(&crc.to_be_bytes());
        URL_SAFE.encode(bytes)
    }
}

fn invalid(s: &str, reason: &str) -> DisbursementError {
    DisbursementError::ValidationError(format!("invalid address \"{s}\": {reason}"))
}

/// CRC-16/XMODEM over the tag, workchain and hash bytes.
fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for byte in data {
        crc ^= (*byte as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}

impl FromStr for Address {
    type Err = DisbursementError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.contains(':') {
            Self::parse_raw(s)
        } else {
            Self::parse_friendly(s)
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.workchain, hex::encode(self.hash))
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
