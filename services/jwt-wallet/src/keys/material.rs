//! Signing key material and its exported form.

use jsonwebtoken::{Algorithm, EncodingKey};

use crate::error::WalletError;
use crate::keys::{encode_key_document, Jwk};

/// A complete signing key: private key, algorithm and key ID.
///
/// All three are required to construct the value, so a wallet holding a
/// `KeyMaterial` can always sign.
pub struct KeyMaterial {
    key: EncodingKey,
    algorithm: Algorithm,
    key_id: String,
    private_jwk: Jwk,
    public_jwk: Option<Jwk>,
}

impl KeyMaterial {
    /// Bundles an imported signing key with its identity.
    #[must_use]
    pub fn new(
        key: EncodingKey,
        algorithm: Algorithm,
        key_id: impl Into<String>,
        private_jwk: Jwk,
    ) -> Self {
        Self {
            key,
            algorithm,
            key_id: key_id.into(),
            private_jwk,
            public_jwk: None,
        }
    }

    /// Attaches the public half, known when the key was generated locally.
    #[must_use]
    pub fn with_public_key(mut self, public_jwk: Jwk) -> Self {
        self.public_jwk = Some(public_jwk);
        self
    }

    /// Signing key handle.
    #[must_use]
    pub const fn encoding_key(&self) -> &EncodingKey {
        &self.key
    }

    /// Signing algorithm.
    #[must_use]
    pub const fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Key ID placed in token headers.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Public key, when known.
    #[must_use]
    pub const fn public_jwk(&self) -> Option<&Jwk> {
        self.public_jwk.as_ref()
    }

    /// Exports both halves as base64 JSON JWKs tagged with kid, alg and use.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::KeyMissing`] when the public half is unknown.
    pub fn export(&self) -> Result<PersistedKeys, WalletError> {
        let public = self.public_jwk.as_ref().ok_or(WalletError::KeyMissing)?;
        if !self.private_jwk.is_private() {
            return Err(WalletError::KeyMissing);
        }

        let private_key =
            encode_key_document(&self.private_jwk.tagged(&self.key_id, self.algorithm))?;
        let public_key = encode_key_document(&public.tagged(&self.key_id, self.algorithm))?;

        Ok(PersistedKeys {
            key_id: self.key_id.clone(),
            private_key,
            public_key,
        })
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("algorithm", &self.algorithm)
            .field("key_id", &self.key_id)
            .field("has_public_key", &self.public_jwk.is_some())
            .finish_non_exhaustive()
    }
}

/// Generated keys in the portable form an operator copies into configuration.
#[derive(Clone)]
pub struct PersistedKeys {
    /// Key ID shared by both halves
    pub key_id: String,
    /// Value for `JWT_PRIVATE`
    pub private_key: String,
    /// Value for `JWT_MOCK_PUBLIC`
    pub public_key: String,
}

impl PersistedKeys {
    /// Renders the keys as `.env` lines.
    #[must_use]
    pub fn env_lines(&self) -> String {
        format!(
            "JWT_PRIVATE={}\nJWT_MOCK_PUBLIC={}",
            self.private_key, self.public_key
        )
    }
}

impl std::fmt::Debug for PersistedKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistedKeys")
            .field("key_id", &self.key_id)
            .field("private_key", &"<redacted>")
            .field("public_key", &self.public_key)
            .finish()
    }
}
