//! In-memory key set.

use std::collections::HashMap;
use std::sync::Arc;

use jsonwebtoken::{Algorithm, DecodingKey};
use tracing::warn;

use crate::error::{KeyResolutionError, WalletError};
use crate::keys::{Jwk, Jwks, KeyCodec};

/// A public key ready for signature verification.
pub struct VerificationKey {
    jwk: Jwk,
    key: DecodingKey,
}

impl VerificationKey {
    /// Key ID, if the JWK carried one.
    #[must_use]
    pub fn kid(&self) -> Option<&str> {
        self.jwk.kid.as_deref()
    }

    /// Public JWK this key was built from.
    #[must_use]
    pub const fn jwk(&self) -> &Jwk {
        &self.jwk
    }

    /// Decoding key handle.
    #[must_use]
    pub const fn decoding_key(&self) -> &DecodingKey {
        &self.key
    }
}

impl std::fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationKey")
            .field("jwk", &self.jwk)
            .finish_non_exhaustive()
    }
}

/// Fixed set of verification keys indexed by key ID.
#[derive(Debug, Default)]
pub struct LocalJwkSet {
    by_kid: HashMap<String, Vec<Arc<VerificationKey>>>,
    unnamed: Vec<Arc<VerificationKey>>,
}

impl LocalJwkSet {
    /// Builds a set from a JWKS document. Every key must be usable.
    ///
    /// # Errors
    ///
    /// Returns the first key import failure.
    pub fn new(jwks: &Jwks, codec: &dyn KeyCodec) -> Result<Self, WalletError> {
        let mut set = Self::default();
        for jwk in &jwks.keys {
            set.insert(jwk, codec.verification_key(jwk)?);
        }
        Ok(set)
    }

    /// Builds a set from a JWKS document, skipping keys that cannot be imported.
    #[must_use]
    pub fn lenient(jwks: &Jwks, codec: &dyn KeyCodec) -> Self {
        let mut set = Self::default();
        for jwk in &jwks.keys {
            match codec.verification_key(jwk) {
                Ok(key) => set.insert(jwk, key),
                Err(e) => warn!(kid = ?jwk.kid, kty = %jwk.kty, error = %e, "Skipping unusable JWK"),
            }
        }
        set
    }

    fn insert(&mut self, jwk: &Jwk, key: DecodingKey) {
        let public = jwk.to_public().unwrap_or_else(|| jwk.clone());
        let entry = Arc::new(VerificationKey { jwk: public, key });
        match jwk.kid.clone() {
            Some(kid) => self.by_kid.entry(kid).or_default().push(entry),
            None => self.unnamed.push(entry),
        }
    }

    /// Number of keys in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_kid.values().map(Vec::len).sum::<usize>() + self.unnamed.len()
    }

    /// Whether the set holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Looks up the key for a token header.
    ///
    /// With a kid the lookup is a map access; without one the set answers
    /// only when exactly one key fits the algorithm.
    ///
    /// # Errors
    ///
    /// Returns [`KeyResolutionError`] when no single key applies.
    pub fn resolve(
        &self,
        kid: Option<&str>,
        algorithm: Option<Algorithm>,
    ) -> Result<Arc<VerificationKey>, KeyResolutionError> {
        let fits = |entry: &&Arc<VerificationKey>| algorithm.is_none_or(|alg| entry.jwk.accepts(alg));

        let Some(kid) = kid else {
            let mut candidates = self
                .by_kid
                .values()
                .flatten()
                .chain(self.unnamed.iter())
                .filter(fits);
            return match (candidates.next(), candidates.next()) {
                (Some(only), None) => Ok(Arc::clone(only)),
                (Some(_), Some(_)) => Err(KeyResolutionError::Ambiguous),
                (None, _) => Err(KeyResolutionError::UnknownKeyId { kid: None }),
            };
        };

        let entries = self
            .by_kid
            .get(kid)
            .ok_or_else(|| KeyResolutionError::UnknownKeyId {
                kid: Some(kid.to_string()),
            })?;

        match algorithm {
            Some(alg) => entries
                .iter()
                .find(|entry| entry.jwk.accepts(alg))
                .map(Arc::clone)
                .ok_or_else(|| KeyResolutionError::AlgorithmMismatch {
                    kid: kid.to_string(),
                    algorithm: alg,
                }),
            None => entries.first().map(Arc::clone).ok_or_else(|| {
                KeyResolutionError::UnknownKeyId {
                    kid: Some(kid.to_string()),
                }
            }),
        }
    }

    /// The public keys as a JWKS document.
    #[must_use]
    pub fn to_jwks(&self) -> Jwks {
        let mut keys: Vec<Jwk> = self
            .by_kid
            .values()
            .flatten()
            .chain(self.unnamed.iter())
            .filter(|entry| !entry.jwk.is_private())
            .map(|entry| entry.jwk.clone())
            .collect();
        keys.sort_by(|a, b| a.kid.cmp(&b.kid));
        Jwks { keys }
    }
}
