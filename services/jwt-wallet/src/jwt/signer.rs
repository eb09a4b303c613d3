//! Token issuance.

use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, Header};
use tracing::{debug, error};

use crate::error::WalletError;
use crate::jwt::claims::Claims;
use crate::keys::KeyMaterial;

/// Signs claim sets with the wallet's key, when it has one.
#[derive(Debug)]
pub struct TokenSigner {
    material: Option<KeyMaterial>,
    issuer: Option<String>,
}

impl TokenSigner {
    /// Creates a signer. Without key material every `sign` call fails.
    #[must_use]
    pub const fn new(material: Option<KeyMaterial>, issuer: Option<String>) -> Self {
        Self { material, issuer }
    }

    /// Whether a signing key is installed.
    #[must_use]
    pub const fn can_sign(&self) -> bool {
        self.material.is_some()
    }

    /// Key ID written to token headers.
    #[must_use]
    pub fn key_id(&self) -> Option<&str> {
        self.material.as_ref().map(KeyMaterial::key_id)
    }

    /// Signs `claims` as a compact JWS expiring at `expires_at`.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::PrivateKeyMissing`] when no signing key is
    /// installed, or [`WalletError::Signing`] if encoding fails.
    pub fn sign(&self, claims: &Claims, expires_at: DateTime<Utc>) -> Result<String, WalletError> {
        self.sign_at(claims, expires_at, Utc::now())
    }

    /// Signs with an explicit issue time.
    ///
    /// `iat` and `nbf` are set to `now`, `exp` to `expires_at`, and `iss` to
    /// the configured issuer, replacing any value the caller supplied.
    ///
    /// # Errors
    ///
    /// See [`TokenSigner::sign`].
    pub fn sign_at(
        &self,
        claims: &Claims,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<String, WalletError> {
        let Some(material) = &self.material else {
            error!("Private key is missing, cannot sign token");
            return Err(WalletError::PrivateKeyMissing);
        };

        let mut payload = claims.clone();
        payload.iat = Some(now.timestamp());
        payload.nbf = Some(now.timestamp());
        payload.exp = Some(expires_at.timestamp());
        payload.iss.clone_from(&self.issuer);

        let mut header = Header::new(material.algorithm());
        header.kid = Some(material.key_id().to_string());

        debug!(
            audience = %payload.log_audience(),
            jti = ?payload.jti,
            sub = ?payload.sub,
            kid = %material.key_id(),
            "Signing token"
        );

        encode(&header, &payload, material.encoding_key())
            .map_err(|e| WalletError::Signing(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{JoseKeyCodec, KeyCodec};
    use chrono::Duration;
    use jsonwebtoken::Algorithm;

    fn material() -> KeyMaterial {
        let pair = JoseKeyCodec.generate(Algorithm::ES256).unwrap();
        let key = JoseKeyCodec.signing_key(&pair.private, Algorithm::ES256).unwrap();
        KeyMaterial::new(key, Algorithm::ES256, "kid-1", pair.private)
    }

    fn payload_of(token: &str) -> Claims {
        use base64::Engine;
        let segment = token.split('.').nth(1).unwrap();
        let json = base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(segment).unwrap();
        serde_json::from_slice(&json).unwrap()
    }

    #[test]
    fn test_sign_without_key_fails() {
        let signer = TokenSigner::new(None, None);
        assert!(!signer.can_sign());
        assert!(matches!(
            signer.sign(&Claims::new(), Utc::now()),
            Err(WalletError::PrivateKeyMissing)
        ));
    }

    #[test]
    fn test_sign_sets_header_and_time_claims() {
        let signer = TokenSigner::new(Some(material()), Some("https://auth.example.com".to_string()));
        let now = Utc::now();
        let claims = Claims {
            iss: Some("spoofed".to_string()),
            ..Claims::new().with_subject("user-1").with_audience("api")
        };

        let token = signer.sign_at(&claims, now + Duration::minutes(5), now).unwrap();

        let header = jsonwebtoken::decode_header(&token).unwrap();
        assert_eq!(header.alg, Algorithm::ES256);
        assert_eq!(header.kid.as_deref(), Some("kid-1"));

        let payload = payload_of(&token);
        assert_eq!(payload.iss.as_deref(), Some("https://auth.example.com"));
        assert_eq!(payload.iat, Some(now.timestamp()));
        assert_eq!(payload.nbf, Some(now.timestamp()));
        assert_eq!(payload.exp, Some((now + Duration::minutes(5)).timestamp()));
        assert_eq!(payload.sub.as_deref(), Some("user-1"));
    }

    #[test]
    fn test_unset_issuer_clears_caller_value() {
        let signer = TokenSigner::new(Some(material()), None);
        let claims = Claims {
            iss: Some("caller".to_string()),
            ..Claims::new()
        };
        let token = signer.sign(&claims, Utc::now() + Duration::minutes(1)).unwrap();
        let payload = payload_of(&token);
        assert!(payload.iss.is_none());
    }
}
