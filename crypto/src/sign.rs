//! ECDSA P-256 signing and verification over SHA-256 of the payload.

use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature as EcdsaSignature, SigningKey};

use tally_types::Signature;

use crate::keys::parse_public_key;

/// Sign `payload`, returning the `(r, s)` scalars.
pub fn sign_payload(signing_key: &SigningKey, payload: &[u8]) -> Signature {
    let sig: EcdsaSignature = signing_key.sign(payload);
    let (r_bytes, s_bytes) = sig.split_bytes();
    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&r_bytes);
    s.copy_from_slice(&s_bytes);
    Signature::new(r, s)
}

/// Verify `(r, s)` over `payload` against a SEC1-encoded public key.
///
/// Returns `false` for malformed keys or scalars as well as for bad signatures.
pub fn verify_signature(public_key: &[u8], payload: &[u8], signature: &Signature) -> bool {
    let Ok(verifying_key) = parse_public_key(public_key) else {
        return false;
    };
    let Ok(sig) = EcdsaSignature::from_scalars(signature.r, signature.s) else {
        return false;
    };
    verifying_key.verify(payload, &sig).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{generate_keypair, keypair_from_seed};

    #[test]
    fn sign_and_verify() {
        let keys = generate_keypair();
        let msg = b"sender=a|receiver=b|amount=5|timestamp=t|note=";
        let sig = sign_payload(&keys.signing_key, msg);
        assert!(verify_signature(&keys.public_key, msg, &sig));
    }

    #[test]
    fn wrong_message_fails() {
        let keys = generate_keypair();
        let sig = sign_payload(&keys.signing_key, b"amount=5");
        assert!(!verify_signature(&keys.public_key, b"amount=6", &sig));
    }

    #[test]
    fn wrong_key_fails() {
        let a = generate_keypair();
        let b = generate_keypair();
        let sig = sign_payload(&a.signing_key, b"test");
        assert!(!verify_signature(&b.public_key, b"test", &sig));
    }

    #[test]
    fn zero_scalars_fail() {
        let keys = generate_keypair();
        let sig = Signature::new([0u8; 32], [0u8; 32]);
        assert!(!verify_signature(&keys.public_key, b"test", &sig));
    }

    #[test]
    fn malformed_public_key_fails() {
        let keys = generate_keypair();
        let sig = sign_payload(&keys.signing_key, b"test");
        assert!(!verify_signature(&[1, 2, 3], b"test", &sig));
    }

    #[test]
    fn signature_deterministic() {
        let keys = keypair_from_seed(&[99u8; 32]).unwrap();
        let sig1 = sign_payload(&keys.signing_key, b"deterministic");
        let sig2 = sign_payload(&keys.signing_key, b"deterministic");
        assert_eq!(sig1, sig2);
    }
}
