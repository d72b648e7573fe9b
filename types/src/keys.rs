//! ECDSA signature scalars as carried by user-signed transfers.

use serde::{Deserialize, Serialize};

use crate::hash::decode_padded_32;
use crate::TypesError;

/// An ECDSA P-256 signature as its two big-endian scalars `(r, s)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub r: [u8; 32],
    pub s: [u8; 32],
}

impl Signature {
    pub fn new(r: [u8; 32], s: [u8; 32]) -> Self {
        Self { r, s }
    }

    /// Parse the hex scalars sent by clients.
    ///
    /// Clients may strip leading zeros, so 1 to 64 digits are accepted per scalar.
    pub fn from_hex(r: &str, s: &str) -> Result<Self, TypesError> {
        let r = decode_padded_32(r.trim())
            .ok_or_else(|| TypesError::InvalidScalar(r.to_string()))?;
        let s = decode_padded_32(s.trim())
            .ok_or_else(|| TypesError::InvalidScalar(s.to_string()))?;
        Ok(Self { r, s })
    }

    pub fn r_hex(&self) -> String {
        hex::encode(&self.r)
    }

    pub fn s_hex(&self) -> String {
        hex::encode(&self.s)
    }
}
