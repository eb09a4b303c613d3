//! Cryptographic capability boundary.
//!
//! Key generation and JWK import live behind [`KeyCodec`] so provisioning can
//! be exercised with alternative implementations. Signing and signature
//! checks go through `jsonwebtoken` with the keys produced here.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use p256::pkcs8::EncodePrivateKey;
use rand::rngs::OsRng;
use tracing::warn;

use crate::error::WalletError;
use crate::keys::Jwk;

/// A freshly generated key pair in JWK form.
#[derive(Debug, Clone)]
pub struct GeneratedKeyPair {
    /// Private JWK (includes the public coordinates)
    pub private: Jwk,
    /// Public JWK
    pub public: Jwk,
}

/// Key generation and JWK import.
pub trait KeyCodec: Send + Sync {
    /// Generates a new key pair for `algorithm`.
    ///
    /// # Errors
    ///
    /// Fails when the algorithm is unsupported or generation fails.
    fn generate(&self, algorithm: Algorithm) -> Result<GeneratedKeyPair, WalletError>;

    /// Imports a private JWK as a signing key for `algorithm`.
    ///
    /// # Errors
    ///
    /// Fails when the key does not fit the algorithm or cannot be decoded.
    fn signing_key(&self, jwk: &Jwk, algorithm: Algorithm) -> Result<EncodingKey, WalletError>;

    /// Imports a public JWK as a verification key.
    ///
    /// # Errors
    ///
    /// Fails when the key type is unsupported, symmetric, or cannot be decoded.
    fn verification_key(&self, jwk: &Jwk) -> Result<DecodingKey, WalletError>;
}

/// Production codec: P-256 generation via `p256`, import via `jsonwebtoken`.
///
/// Signing supports ES256 and HMAC keys; verification additionally accepts
/// RSA and Ed25519 public keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct JoseKeyCodec;

impl JoseKeyCodec {
    fn ec_signing_key(jwk: &Jwk) -> Result<EncodingKey, WalletError> {
        if jwk.kty != "EC" || jwk.crv.as_deref().unwrap_or("P-256") != "P-256" {
            return Err(WalletError::invalid_key(
                "private_key",
                format!("ES256 requires a P-256 EC key, got {} {:?}", jwk.kty, jwk.crv),
            ));
        }
        let d = jwk
            .d
            .as_deref()
            .ok_or_else(|| WalletError::invalid_key("private_key", "missing private scalar d"))?;
        let scalar = URL_SAFE_NO_PAD
            .decode(d)
            .map_err(|e| WalletError::invalid_key("private_key", e))?;
        let secret = p256::SecretKey::from_slice(&scalar)
            .map_err(|e| WalletError::invalid_key("private_key", e))?;

        if let (Some(x), Some(y)) = (&jwk.x, &jwk.y) {
            let derived: Jwk = serde_json::from_str(&secret.public_key().to_jwk_string())
                .map_err(|e| WalletError::invalid_key("private_key", e))?;
            if derived.x.as_ref() != Some(x) || derived.y.as_ref() != Some(y) {
                return Err(WalletError::invalid_key(
                    "private_key",
                    "public coordinates do not match private scalar",
                ));
            }
        }

        let der = secret
            .to_pkcs8_der()
            .map_err(|e| WalletError::invalid_key("private_key", e))?;
        Ok(EncodingKey::from_ec_der(der.as_bytes()))
    }

    fn symmetric_secret(jwk: &Jwk, field: &'static str) -> Result<Vec<u8>, WalletError> {
        if jwk.kty != "oct" {
            return Err(WalletError::invalid_key(
                field,
                format!("HMAC requires an oct key, got {}", jwk.kty),
            ));
        }
        let k = jwk
            .k
            .as_deref()
            .ok_or_else(|| WalletError::invalid_key(field, "missing symmetric value k"))?;
        URL_SAFE_NO_PAD
            .decode(k)
            .map_err(|e| WalletError::invalid_key(field, e))
    }

    fn component<'a>(value: Option<&'a String>, name: &str) -> Result<&'a str, WalletError> {
        value
            .map(String::as_str)
            .ok_or_else(|| WalletError::invalid_key("jwk", format!("missing component {name}")))
    }
}

impl KeyCodec for JoseKeyCodec {
    fn generate(&self, algorithm: Algorithm) -> Result<GeneratedKeyPair, WalletError> {
        if algorithm != Algorithm::ES256 {
            return Err(WalletError::UnsupportedAlgorithm {
                algorithm: format!("{algorithm:?}"),
            });
        }

        let secret = p256::SecretKey::random(&mut OsRng);
        let private: Jwk = serde_json::from_str(&secret.to_jwk_string())
            .map_err(|e| WalletError::invalid_key("generated", e))?;
        let public: Jwk = serde_json::from_str(&secret.public_key().to_jwk_string())
            .map_err(|e| WalletError::invalid_key("generated", e))?;

        Ok(GeneratedKeyPair { private, public })
    }

    fn signing_key(&self, jwk: &Jwk, algorithm: Algorithm) -> Result<EncodingKey, WalletError> {
        let key = match algorithm {
            Algorithm::ES256 => Self::ec_signing_key(jwk)?,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
                EncodingKey::from_secret(&Self::symmetric_secret(jwk, "private_key")?)
            }
            other => {
                return Err(WalletError::UnsupportedAlgorithm {
                    algorithm: format!("{other:?}"),
                });
            }
        };

        // Surface unusable keys at startup rather than on the first request.
        jsonwebtoken::crypto::sign(b"key-check", &key, algorithm)
            .map_err(|e| WalletError::invalid_key("private_key", e))?;
        Ok(key)
    }

    fn verification_key(&self, jwk: &Jwk) -> Result<DecodingKey, WalletError> {
        let invalid = |e: jsonwebtoken::errors::Error| WalletError::invalid_key("jwk", e);
        match jwk.kty.as_str() {
            "EC" => {
                let crv = jwk.crv.as_deref().unwrap_or("P-256");
                if !matches!(crv, "P-256" | "P-384") {
                    warn!(kid = ?jwk.kid, crv = %crv, "Unsupported EC curve, rejecting");
                    return Err(WalletError::UnsupportedAlgorithm {
                        algorithm: crv.to_string(),
                    });
                }
                DecodingKey::from_ec_components(
                    Self::component(jwk.x.as_ref(), "x")?,
                    Self::component(jwk.y.as_ref(), "y")?,
                )
                .map_err(invalid)
            }
            "RSA" => DecodingKey::from_rsa_components(
                Self::component(jwk.n.as_ref(), "n")?,
                Self::component(jwk.e.as_ref(), "e")?,
            )
            .map_err(invalid),
            "OKP" => DecodingKey::from_ed_components(Self::component(jwk.x.as_ref(), "x")?)
                .map_err(invalid),
            "oct" => {
                warn!(kid = ?jwk.kid, "Symmetric key offered for verification, rejecting");
                Err(WalletError::invalid_key(
                    "jwk",
                    "symmetric keys cannot verify tokens",
                ))
            }
            other => Err(WalletError::UnsupportedAlgorithm {
                algorithm: other.to_string(),
            }),
        }
    }
}
