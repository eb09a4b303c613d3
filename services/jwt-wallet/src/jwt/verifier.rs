//! Token verification against the wallet's key resolver.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{VerificationError, VerificationFailure};
use crate::jwt::claims::Claims;
use crate::jwt::token::{Token, Unverified};
use crate::resolver::KeyResolver;

/// Verifies compact JWS tokens.
#[derive(Debug)]
pub struct TokenVerifier {
    resolver: KeyResolver,
}

impl TokenVerifier {
    /// Creates a verifier backed by `resolver`.
    #[must_use]
    pub const fn new(resolver: KeyResolver) -> Self {
        Self { resolver }
    }

    /// Key source used for verification.
    #[must_use]
    pub const fn resolver(&self) -> &KeyResolver {
        &self.resolver
    }

    /// Verifies signature, expiry, not-before and audience.
    ///
    /// # Errors
    ///
    /// Returns a [`VerificationError`] describing the first failed check.
    pub async fn verify(&self, token: &str, audience: &str) -> Result<Claims, VerificationError> {
        self.verify_at(token, audience, Utc::now()).await
    }

    /// Verifies against an explicit clock.
    ///
    /// # Errors
    ///
    /// See [`TokenVerifier::verify`].
    pub async fn verify_at(
        &self,
        token: &str,
        audience: &str,
        now: DateTime<Utc>,
    ) -> Result<Claims, VerificationError> {
        let result = async {
            let unverified = Token::<Unverified>::parse(token)?;
            let signed = unverified.verify_signature(&self.resolver).await?;
            let verified = signed.validate_claims(audience, now.timestamp())?;
            Ok::<_, VerificationFailure>(verified.into_claims())
        }
        .await;

        if let Err(reason) = &result {
            debug!(
                resolver = self.resolver.kind(),
                audience = %audience,
                reason = %reason,
                "Token verification failed"
            );
        }

        result.map_err(VerificationError::from)
    }
}
