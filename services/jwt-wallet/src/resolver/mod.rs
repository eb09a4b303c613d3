//! Verification key resolution.

pub mod local;
pub mod remote;

pub use local::{LocalJwkSet, VerificationKey};
pub use remote::RemoteJwkSet;

use std::sync::Arc;

use jsonwebtoken::Algorithm;

use crate::error::KeyResolutionError;
use crate::keys::Jwks;

/// The single key source of a wallet.
#[derive(Debug)]
pub enum KeyResolver {
    /// Keys embedded in configuration.
    LocalSet(LocalJwkSet),
    /// Keys fetched from the issuer's JWKS endpoint.
    RemoteSet(RemoteJwkSet),
    /// The public half of a key generated at startup.
    Generated(LocalJwkSet),
}

impl KeyResolver {
    /// Returns the key matching a token's `kid` and `alg` header values.
    ///
    /// # Errors
    ///
    /// Returns [`KeyResolutionError`] when no key applies or the remote
    /// key set cannot be fetched.
    pub async fn resolve(
        &self,
        kid: Option<&str>,
        algorithm: Option<Algorithm>,
    ) -> Result<Arc<VerificationKey>, KeyResolutionError> {
        match self {
            Self::LocalSet(set) | Self::Generated(set) => set.resolve(kid, algorithm),
            Self::RemoteSet(remote) => remote.resolve(kid, algorithm).await,
        }
    }

    /// Short name of the variant, for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::LocalSet(_) => "local",
            Self::RemoteSet(_) => "remote",
            Self::Generated(_) => "generated",
        }
    }

    /// Public JWKS document for locally held keys. Remote sets have none.
    #[must_use]
    pub fn local_jwks(&self) -> Option<Jwks> {
        match self {
            Self::LocalSet(set) | Self::Generated(set) => Some(set.to_jwks()),
            Self::RemoteSet(_) => None,
        }
    }
}
