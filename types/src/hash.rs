//! 32-byte identifiers for wallets, transactions and UTXOs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::TypesError;

/// Declares a 32-byte identifier newtype rendered as lowercase hex.
macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name([u8; 32]);

        impl $name {
            pub fn new(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Parse exactly 64 hex digits.
            pub fn from_hex(s: &str) -> Result<Self, TypesError> {
                let mut bytes = [0u8; 32];
                hex::decode_to_slice(s, &mut bytes).map_err(|_| TypesError::InvalidId {
                    kind: $kind,
                    value: s.to_string(),
                })?;
                Ok(Self(bytes))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(
                    f,
                    concat!(stringify!($name), "({}\u{2026})"),
                    hex::encode(&self.0[..4])
                )
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl FromStr for $name {
            type Err = TypesError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_hex(s)
            }
        }
    };
}

pub(crate) use id_type;

id_type!(
    /// Wallet identifier: SHA-256 of the wallet's SEC1-encoded public key.
    WalletId,
    "wallet"
);

id_type!(
    /// Transaction identifier, a function of `(sender, nonce)`.
    TxId,
    "transaction"
);

id_type!(
    /// Identifier of a single unspent (or spent) transaction output.
    UtxoId,
    "utxo"
);

/// Decode 1..=64 hex digits as a big-endian number, left-padded to 32 bytes.
pub(crate) fn decode_padded_32(s: &str) -> Option<[u8; 32]> {
    if s.is_empty() || s.len() > 64 {
        return None;
    }
    let even = if s.len() % 2 == 1 {
        format!("0{s}")
    } else {
        s.to_string()
    };
    let bytes = hex::decode(even).ok()?;
    let mut out = [0u8; 32];
    out[32 - bytes.len()..].copy_from_slice(&bytes);
    Some(out)
}
