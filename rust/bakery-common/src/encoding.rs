//! Base64 flavors used by the macaroon wire format and by serialized
//! macaroon blobs.

use base64::{
    DecodeError, Engine,
    engine::general_purpose::{STANDARD, URL_SAFE, URL_SAFE_NO_PAD},
};

/// Encode bytes as URL-safe base64 without padding (the `vid` field format).
pub fn encode_url_safe(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode base64 produced by any of the encoders peers are known to use.
///
/// URL-safe unpadded is tried first, then URL-safe padded, then standard.
pub fn decode_lenient(encoded: &str) -> Result<Vec<u8>, DecodeError> {
    URL_SAFE_NO_PAD
        .decode(encoded)
        .or_else(|_| URL_SAFE.decode(encoded))
        .or_else(|_| STANDARD.decode(encoded))
}

/// Encode bytes as standard, padded base64 (the storage blob format).
pub fn encode_standard(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode standard, padded base64.
pub fn decode_standard(encoded: &str) -> Result<Vec<u8>, DecodeError> {
    STANDARD.decode(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_encodes_without_padding_or_unsafe_characters() {
        let encoded = encode_url_safe(&[0xfb, 0xff, 0xfe, 0x01]);
        assert!(!encoded.contains('='));
        assert!(!encoded.contains('+'));
        assert!(!encoded.contains('/'));
    }

    #[test]
    fn it_decodes_every_known_flavor() {
        let bytes = vec![0xfb, 0xff, 0xfe, 0x01];

        assert_eq!(decode_lenient(&URL_SAFE_NO_PAD.encode(&bytes)).unwrap(), bytes);
        assert_eq!(decode_lenient(&URL_SAFE.encode(&bytes)).unwrap(), bytes);
        assert_eq!(decode_lenient(&STANDARD.encode(&bytes)).unwrap(), bytes);
    }

    #[test]
    fn it_rejects_garbage() {
        assert!(decode_lenient("not base64 at all!").is_err());
        assert!(decode_standard("%%%").is_err());
    }
}
