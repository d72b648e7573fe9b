use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("public key is not a valid SEC1-encoded P-256 point")]
    InvalidPublicKey,

    #[error("private key is not a valid P-256 scalar")]
    InvalidPrivateKey,

    #[error("encryption key must be 32 bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("sealed secret is too short ({0} bytes)")]
    Truncated(usize),

    #[error("encryption failed")]
    Encryption,

    #[error("decryption failed: wrong key or tampered ciphertext")]
    Decryption,
}
