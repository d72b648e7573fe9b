//! P-256 key handling and wallet identifier derivation.

use p256::ecdsa::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use tally_types::WalletId;

use crate::hash::sha256;
use crate::CryptoError;

/// A freshly generated wallet key pair.
pub struct WalletKeys {
    pub signing_key: SigningKey,
    /// SEC1 uncompressed public key (`0x04 || X || Y`, 65 bytes).
    pub public_key: Vec<u8>,
}

impl WalletKeys {
    fn from_signing_key(signing_key: SigningKey) -> Self {
        let public_key = signing_key
            .verifying_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec();
        Self {
            signing_key,
            public_key,
        }
    }

    pub fn wallet_id(&self) -> WalletId {
        derive_wallet_id(&self.public_key)
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(&self.public_key)
    }

    /// Raw private scalar, wiped from memory when dropped.
    pub fn private_key_bytes(&self) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(self.signing_key.to_bytes().to_vec())
    }
}

/// Generate a random key pair using the OS RNG.
pub fn generate_keypair() -> WalletKeys {
    WalletKeys::from_signing_key(SigningKey::random(&mut OsRng))
}

/// Deterministic key pair from a 32-byte seed used as the private scalar.
pub fn keypair_from_seed(seed: &[u8; 32]) -> Result<WalletKeys, CryptoError> {
    signing_key_from_bytes(seed).map(WalletKeys::from_signing_key)
}

pub fn signing_key_from_bytes(bytes: &[u8]) -> Result<SigningKey, CryptoError> {
    SigningKey::from_slice(bytes).map_err(|_| CryptoError::InvalidPrivateKey)
}

/// Parse a SEC1-encoded public key (compressed or uncompressed).
pub fn parse_public_key(bytes: &[u8]) -> Result<VerifyingKey, CryptoError> {
    VerifyingKey::from_sec1_bytes(bytes).map_err(|_| CryptoError::InvalidPublicKey)
}

/// Wallet identifier: SHA-256 of the serialized public key bytes.
pub fn derive_wallet_id(public_key: &[u8]) -> WalletId {
    WalletId::new(sha256(public_key))
}
