//! Transaction status and provenance.

use serde::{Deserialize, Serialize};

use crate::Signature;

/// Lifecycle of a transaction. Transitions only from `Pending` to `Committed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxStatus {
    /// Accepted into the ledger, not yet sealed in a block.
    Pending,
    /// Included in a sealed block.
    Committed,
}

impl TxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Committed => "committed",
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// Who authorised a transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Provenance {
    /// Signed by the sender wallet's private key over the canonical payload.
    UserSigned { signature: Signature },
    /// Minted by the ledger itself (e.g. a periodic levy); carries no signature.
    SystemIssued { reason: String },
}

impl Provenance {
    pub fn is_system(&self) -> bool {
        matches!(self, Self::SystemIssued { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::UserSigned { .. } => "user_signed",
            Self::SystemIssued { .. } => "system_issued",
        }
    }

    pub fn signature(&self) -> Option<&Signature> {
        match self {
            Self::UserSigned { signature } => Some(signature),
            Self::SystemIssued { .. } => None,
        }
    }
}
