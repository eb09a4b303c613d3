//! Key material, JWK documents and the cryptographic capability boundary.

pub mod codec;
pub mod jwk;
pub mod material;

pub use codec::{GeneratedKeyPair, JoseKeyCodec, KeyCodec};
pub use jwk::{algorithm_name, parse_algorithm, Jwk, Jwks};
pub use material::{KeyMaterial, PersistedKeys};

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::Engine;

use crate::error::WalletError;

const LENIENT: GeneralPurposeConfig =
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent);
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);

/// Decodes a base64 key document. Both alphabets are accepted, padding is optional.
///
/// # Errors
///
/// Returns [`WalletError::InvalidKeyMaterial`] if the input is not base64 or not JSON.
pub fn decode_key_document(
    field: &'static str,
    encoded: &str,
) -> Result<serde_json::Value, WalletError> {
    let trimmed = encoded.trim();
    let bytes = STANDARD_LENIENT
        .decode(trimmed)
        .or_else(|_| URL_SAFE_LENIENT.decode(trimmed))
        .map_err(|e| WalletError::invalid_key(field, e))?;

    serde_json::from_slice(&bytes).map_err(|e| WalletError::invalid_key(field, e))
}

/// Parses a decoded key document into a [`Jwk`].
///
/// # Errors
///
/// Returns [`WalletError::InvalidKeyMaterial`] when the document is not a JWK.
pub fn jwk_from_document(field: &'static str, document: serde_json::Value) -> Result<Jwk, WalletError> {
    serde_json::from_value(document).map_err(|e| WalletError::invalid_key(field, e))
}

/// Encodes a JWK as base64 JSON.
///
/// # Errors
///
/// Returns [`WalletError::InvalidKeyMaterial`] if serialization fails.
pub fn encode_key_document(jwk: &Jwk) -> Result<String, WalletError> {
    let json = serde_json::to_vec(jwk).map_err(|e| WalletError::invalid_key("jwk", e))?;
    Ok(STANDARD.encode(json))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_accepts_unpadded_and_url_safe() {
        let json = br#"{"kty":"oct","k":"_-8"}"#;
        let padded = STANDARD.encode(json);
        let unpadded = padded.trim_end_matches('=').to_string();
        let url_safe = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(json);

        for encoded in [padded, unpadded, url_safe] {
            let doc = decode_key_document("private_key", &encoded).unwrap();
            assert_eq!(doc["kty"], "oct");
        }
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let result = decode_key_document("private_key", "not base64 at all!");
        assert!(matches!(
            result,
            Err(WalletError::InvalidKeyMaterial { field: "private_key", .. })
        ));
    }

    #[test]
    fn test_decode_rejects_non_json() {
        let encoded = STANDARD.encode(b"plain text");
        assert!(decode_key_document("dev_public_key", &encoded).is_err());
    }

    #[test]
    fn test_encode_then_decode_document() {
        let jwk: Jwk = serde_json::from_value(serde_json::json!({
            "kty": "EC", "crv": "P-256", "x": "abc", "y": "def", "kid": "k1"
        }))
        .unwrap();
        let encoded = encode_key_document(&jwk).unwrap();
        let decoded = jwk_from_document("dev_public_key", decode_key_document("dev_public_key", &encoded).unwrap()).unwrap();
        assert_eq!(decoded, jwk);
    }
}
