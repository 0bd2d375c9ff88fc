//! Cryptographic primitives behind the macaroon signature chain.
//!
//! Every function here is pure apart from [`encrypt`] and [`generate_root_key`],
//! which draw from the operating system RNG.
//!
//! - MAC: HMAC-SHA256.
//! - Key derivation: HMAC-SHA256 keyed with the fixed generator string
//!   `"macaroons-key-generator"` (zero padded to 32 bytes) over the raw key.
//! - Authenticated encryption: XChaCha20-Poly1305 with a fresh random 24 byte
//!   nonce per call; the output is `nonce || ciphertext`.

use chacha20poly1305::{
    Key, XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit},
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::MacaroonError;

/// Length in bytes of keys and signatures.
pub const KEY_LENGTH: usize = 32;

/// Length in bytes of the AEAD nonce prepended to every ciphertext.
pub const NONCE_LENGTH: usize = 24;

/// A fixed-size key or signature. Macaroon signatures double as keys for the
/// next link of the chain, so both share one representation.
pub type Signature = [u8; KEY_LENGTH];

const KEY_GENERATOR: &[u8] = b"macaroons-key-generator";

/// Derive the MAC key actually used to mint a macaroon from its raw root key.
///
/// Root keys are never used directly as MAC keys.
pub fn derive_key(root_key: &[u8]) -> Signature {
    let mut generator = [0u8; KEY_LENGTH];
    generator[..KEY_GENERATOR.len()].copy_from_slice(KEY_GENERATOR);
    keyed_hash(&generator, root_key)
}

/// HMAC-SHA256 of `data` under `key`.
pub fn keyed_hash(key: &[u8], data: &[u8]) -> Signature {
    let mut mac =
        <Hmac<Sha256> as Mac>::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);

    let mut output = [0u8; KEY_LENGTH];
    output.copy_from_slice(&mac.finalize().into_bytes());
    output
}

/// Hash two values under one key.
///
/// With no first value this is exactly [`keyed_hash`] over the second, which
/// is how first-party caveats (no verification id) are folded into the chain.
pub fn keyed_hash2(key: &[u8], first: Option<&[u8]>, second: &[u8]) -> Signature {
    match first {
        None => keyed_hash(key, second),
        Some(first) => {
            let mut joined = [0u8; KEY_LENGTH * 2];
            joined[..KEY_LENGTH].copy_from_slice(&keyed_hash(key, first));
            joined[KEY_LENGTH..].copy_from_slice(&keyed_hash(key, second));
            keyed_hash(key, &joined)
        }
    }
}

/// Tie a discharge signature to the signature of the macaroon it is
/// presented with. Binding a macaroon to itself leaves it unchanged.
pub fn bind_for_request(root_signature: &Signature, signature: &Signature) -> Signature {
    if signatures_equal(root_signature, signature) {
        return *signature;
    }
    keyed_hash2(&[0u8; KEY_LENGTH], Some(root_signature), signature)
}

/// Constant time signature comparison.
pub fn signatures_equal(left: &Signature, right: &Signature) -> bool {
    left.ct_eq(right).into()
}

/// Seal `plaintext` under `key`, returning `nonce || ciphertext`.
pub fn encrypt(key: &Signature, plaintext: &[u8]) -> Result<Vec<u8>, MacaroonError> {
    let mut nonce = [0u8; NONCE_LENGTH];
    getrandom::getrandom(&mut nonce).map_err(|error| MacaroonError::Rng(error.to_string()))?;

    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));
    let sealed = cipher
        .encrypt(XNonce::from_slice(&nonce), plaintext)
        .map_err(|_| MacaroonError::EncryptionFailed)?;

    let mut output = Vec::with_capacity(NONCE_LENGTH + sealed.len());
    output.extend_from_slice(&nonce);
    output.extend_from_slice(&sealed);
    Ok(output)
}

/// Open a value produced by [`encrypt`]. Returns `None` when the input is
/// truncated or fails authentication.
pub fn decrypt(key: &Signature, ciphertext: &[u8]) -> Option<Vec<u8>> {
    if ciphertext.len() < NONCE_LENGTH {
        return None;
    }
    let (nonce, sealed) = ciphertext.split_at(NONCE_LENGTH);
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));
    cipher.decrypt(XNonce::from_slice(nonce), sealed).ok()
}

/// Generate a random root key suitable for [`crate::Macaroon::new`] or
/// [`crate::Macaroon::add_third_party_caveat`].
pub fn generate_root_key() -> Result<Signature, MacaroonError> {
    let mut key = [0u8; KEY_LENGTH];
    getrandom::getrandom(&mut key).map_err(|error| MacaroonError::Rng(error.to_string()))?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_derives_keys_deterministically() {
        assert_eq!(derive_key(b"secret"), derive_key(b"secret"));
        assert_ne!(derive_key(b"secret"), derive_key(b"secret2"));
        assert_ne!(derive_key(b"secret"), keyed_hash(b"secret", b"secret"));
    }

    #[test]
    fn it_reduces_keyed_hash2_to_keyed_hash_without_a_first_value() {
        let key = [7u8; KEY_LENGTH];
        assert_eq!(keyed_hash2(&key, None, b"cav"), keyed_hash(&key, b"cav"));
        assert_ne!(
            keyed_hash2(&key, Some(b"vid"), b"cav"),
            keyed_hash(&key, b"cav")
        );
    }

    #[test]
    fn it_does_not_rebind_a_signature_to_itself() {
        let signature = [3u8; KEY_LENGTH];
        assert_eq!(bind_for_request(&signature, &signature), signature);

        let other = [4u8; KEY_LENGTH];
        let bound = bind_for_request(&signature, &other);
        assert_ne!(bound, other);
        assert_eq!(bound, keyed_hash2(&[0u8; KEY_LENGTH], Some(&signature), &other));
    }

    #[test]
    fn it_round_trips_through_encryption() {
        let key = [9u8; KEY_LENGTH];
        let sealed = encrypt(&key, b"discharge root key").unwrap();
        assert_eq!(decrypt(&key, &sealed).unwrap(), b"discharge root key");
    }

    #[test]
    fn it_uses_a_fresh_nonce_for_every_encryption() {
        let key = [9u8; KEY_LENGTH];
        let first = encrypt(&key, b"same").unwrap();
        let second = encrypt(&key, b"same").unwrap();
        assert_ne!(first[..NONCE_LENGTH], second[..NONCE_LENGTH]);
        assert_ne!(first[..NONCE_LENGTH], [0u8; NONCE_LENGTH]);
    }

    #[test]
    fn it_refuses_to_decrypt_with_the_wrong_key_or_tampered_input() {
        let key = [9u8; KEY_LENGTH];
        let mut sealed = encrypt(&key, b"payload").unwrap();

        assert!(decrypt(&[8u8; KEY_LENGTH], &sealed).is_none());
        assert!(decrypt(&key, &sealed[..NONCE_LENGTH - 1]).is_none());

        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(decrypt(&key, &sealed).is_none());
    }
}
