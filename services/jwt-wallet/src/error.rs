//! Error types for key provisioning, token signing and token verification.
//!
//! Provisioning failures abort [`Wallet`](crate::Wallet) construction.
//! Signing and verification failures are returned to the individual caller
//! and never affect other requests.

use std::time::Duration;

use jsonwebtoken::Algorithm;
use jsonwebtoken::errors::ErrorKind;
use thiserror::Error;

use crate::config::ConfigError;
use crate::keys::PersistedKeys;

/// Top-level error returned by the wallet.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum WalletError {
    /// Signing was attempted without a signing key installed.
    #[error("Private key is missing")]
    PrivateKeyMissing,

    /// Keys expected to exist were absent while exporting them.
    #[error("Key is missing")]
    KeyMissing,

    /// Configured private key material carries no key ID.
    #[error("Key ID did not match: configured private key has no kid")]
    KeyIdMismatch,

    /// Configured or generated key material carries no algorithm.
    #[error("Key algorithm is undefined")]
    UndefinedAlgorithm,

    /// Keys were generated and logged; the process must restart with them configured.
    #[error("Exiting due to missing keys")]
    SaveTokenExit {
        /// The generated keys in their portable encoded form
        keys: Box<PersistedKeys>,
    },

    /// Key material uses an algorithm this wallet cannot handle.
    #[error("Unsupported key algorithm: {algorithm}")]
    UnsupportedAlgorithm {
        /// Algorithm name as found in the key or header
        algorithm: String,
    },

    /// Configured key material could not be decoded.
    #[error("Invalid key material in {field}: {reason}")]
    InvalidKeyMaterial {
        /// Configuration field holding the key
        field: &'static str,
        /// Description of the decoding failure
        reason: String,
    },

    /// The signing primitive failed.
    #[error("Token signing failed: {0}")]
    Signing(String),

    /// Token verification failed.
    #[error(transparent)]
    Verification(VerificationError),

    /// The verification key source is unreachable or returned garbage.
    #[error(transparent)]
    KeyResolution(#[from] KeyResolutionError),

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl WalletError {
    /// Stable error code for logs and host-level mapping.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::PrivateKeyMissing => "JWT_PRIVATE_KEY_MISSING",
            Self::KeyMissing => "JWT_KEY_MISSING",
            Self::KeyIdMismatch => "JWT_KEY_ID_MISMATCH",
            Self::UndefinedAlgorithm => "JWT_UNDEFINED_ALGORITHM",
            Self::SaveTokenExit { .. } => "JWT_SAVE_TOKEN_EXIT",
            Self::UnsupportedAlgorithm { .. } => "JWT_UNSUPPORTED_ALGORITHM",
            Self::InvalidKeyMaterial { .. } => "JWT_INVALID_KEY_MATERIAL",
            Self::Signing(_) => "JWT_SIGNING_FAILED",
            Self::Verification(_) => "JWT_VERIFICATION_FAILED",
            Self::KeyResolution(_) => "JWT_KEY_RESOLUTION_FAILED",
            Self::Config(_) => "JWT_CONFIG_INVALID",
        }
    }

    /// Whether a caller may reasonably retry the operation later.
    ///
    /// Only resolver outages qualify. The wallet itself never retries.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::KeyResolution(err) => err.is_infrastructure(),
            Self::Verification(err) => err.is_infrastructure(),
            _ => false,
        }
    }

    pub(crate) fn invalid_key(field: &'static str, reason: impl std::fmt::Display) -> Self {
        Self::InvalidKeyMaterial {
            field,
            reason: reason.to_string(),
        }
    }
}

/// Failure to locate or fetch a verification key.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyResolutionError {
    /// No key with the requested ID is known.
    #[error("No verification key found for kid {kid:?}")]
    UnknownKeyId {
        /// Requested key ID, absent when the token header had none
        kid: Option<String>,
    },

    /// The token has no kid and more than one key could apply.
    #[error("Token has no kid and multiple verification keys match")]
    Ambiguous,

    /// The key exists but is bound to another algorithm.
    #[error("Key {kid} does not allow algorithm {algorithm:?}")]
    AlgorithmMismatch {
        /// Key ID
        kid: String,
        /// Algorithm requested by the token header
        algorithm: Algorithm,
    },

    /// The JWKS endpoint could not be reached or answered with an error.
    #[error("Failed to fetch JWKS from {url}: {reason}")]
    Fetch {
        /// JWKS URL
        url: String,
        /// Description of the failure
        reason: String,
    },

    /// The JWKS request did not complete in time.
    #[error("JWKS fetch from {url} timed out after {timeout:?}")]
    Timeout {
        /// JWKS URL
        url: String,
        /// Configured timeout
        timeout: Duration,
    },

    /// The JWKS endpoint answered with something that is not a key set.
    #[error("Malformed JWKS document: {reason}")]
    MalformedDocument {
        /// Description of the parse failure
        reason: String,
    },
}

impl KeyResolutionError {
    /// True when the failure is an outage of the key source rather than a bad token.
    #[must_use]
    pub const fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            Self::Fetch { .. } | Self::Timeout { .. } | Self::MalformedDocument { .. }
        )
    }
}

/// Single verification failure category with an embedded reason.
#[derive(Error, Debug)]
#[error("Token verification failed: {reason}")]
pub struct VerificationError {
    /// Why verification failed
    pub reason: VerificationFailure,
}

impl VerificationError {
    /// True when the underlying cause is a key source outage.
    #[must_use]
    pub const fn is_infrastructure(&self) -> bool {
        match &self.reason {
            VerificationFailure::KeyResolution(err) => err.is_infrastructure(),
            _ => false,
        }
    }
}

impl From<VerificationError> for WalletError {
    /// Key source outages surface as [`WalletError::KeyResolution`]; every
    /// other failure is a rejected token.
    fn from(err: VerificationError) -> Self {
        match err.reason {
            VerificationFailure::KeyResolution(inner) if inner.is_infrastructure() => {
                Self::KeyResolution(inner)
            }
            reason => Self::Verification(VerificationError { reason }),
        }
    }
}

impl From<VerificationFailure> for VerificationError {
    fn from(reason: VerificationFailure) -> Self {
        Self { reason }
    }
}

/// Reason carried by a [`VerificationError`].
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerificationFailure {
    /// Token structure or encoding is invalid.
    #[error("token malformed: {reason}")]
    Malformed {
        /// Description of the malformation
        reason: String,
    },

    /// The verification key could not be resolved.
    #[error("key resolution failed: {0}")]
    KeyResolution(KeyResolutionError),

    /// Signature does not match.
    #[error("signature invalid")]
    InvalidSignature,

    /// Header algorithm is not usable with the resolved key.
    #[error("algorithm not allowed for key")]
    InvalidAlgorithm,

    /// `exp` is in the past.
    #[error("token expired")]
    Expired,

    /// `nbf` is in the future.
    #[error("token not yet valid")]
    NotYetValid,

    /// `aud` does not contain the expected audience.
    #[error("audience mismatch")]
    AudienceMismatch,

    /// A required claim is absent.
    #[error("missing required claim {claim}")]
    MissingClaim {
        /// Claim name
        claim: String,
    },
}

impl From<KeyResolutionError> for VerificationFailure {
    fn from(err: KeyResolutionError) -> Self {
        Self::KeyResolution(err)
    }
}

impl From<jsonwebtoken::errors::Error> for VerificationFailure {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::ImmatureSignature => Self::NotYetValid,
            ErrorKind::InvalidAudience => Self::AudienceMismatch,
            ErrorKind::MissingRequiredClaim(claim) => Self::MissingClaim {
                claim: claim.clone(),
            },
            ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidAlgorithmName
            | ErrorKind::MissingAlgorithm
            | ErrorKind::InvalidKeyFormat
            | ErrorKind::InvalidEcdsaKey => Self::InvalidAlgorithm,
            _ => Self::Malformed {
                reason: err.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_outages_are_infrastructure() {
        let fetch = KeyResolutionError::Fetch {
            url: "https://auth.example.com/.well-known/jwks.json".to_string(),
            reason: "connection refused".to_string(),
        };
        assert!(fetch.is_infrastructure());
        assert!(!KeyResolutionError::UnknownKeyId { kid: None }.is_infrastructure());
        assert!(!KeyResolutionError::Ambiguous.is_infrastructure());
    }

    #[test]
    fn test_retryable_only_for_outages() {
        let outage = WalletError::Verification(VerificationError::from(
            VerificationFailure::KeyResolution(KeyResolutionError::Timeout {
                url: "https://auth.example.com/.well-known/jwks.json".to_string(),
                timeout: Duration::from_secs(5),
            }),
        ));
        assert!(outage.is_retryable());

        let forged = WalletError::Verification(VerificationFailure::InvalidSignature.into());
        assert!(!forged.is_retryable());
        assert!(!WalletError::PrivateKeyMissing.is_retryable());
    }

    #[test]
    fn test_outages_convert_to_key_resolution() {
        let timeout = KeyResolutionError::Timeout {
            url: "https://auth.example.com/.well-known/jwks.json".to_string(),
            timeout: Duration::from_secs(5),
        };
        let err = WalletError::from(VerificationError::from(
            VerificationFailure::KeyResolution(timeout.clone()),
        ));
        assert!(matches!(&err, WalletError::KeyResolution(inner) if *inner == timeout));
        assert_eq!(err.code(), "JWT_KEY_RESOLUTION_FAILED");
        assert!(err.is_retryable());

        let unknown = WalletError::from(VerificationError::from(
            VerificationFailure::KeyResolution(KeyResolutionError::UnknownKeyId { kid: None }),
        ));
        assert_eq!(unknown.code(), "JWT_VERIFICATION_FAILED");
        assert!(!unknown.is_retryable());
    }

    #[test]
    fn test_jsonwebtoken_error_mapping() {
        let expired: VerificationFailure =
            jsonwebtoken::errors::Error::from(ErrorKind::ExpiredSignature).into();
        assert_eq!(expired, VerificationFailure::Expired);

        let aud: VerificationFailure =
            jsonwebtoken::errors::Error::from(ErrorKind::InvalidAudience).into();
        assert_eq!(aud, VerificationFailure::AudienceMismatch);

        let sig: VerificationFailure =
            jsonwebtoken::errors::Error::from(ErrorKind::InvalidSignature).into();
        assert_eq!(sig, VerificationFailure::InvalidSignature);
    }

    #[test]
    fn test_error_codes_are_distinct() {
        let codes = [
            WalletError::PrivateKeyMissing.code(),
            WalletError::KeyMissing.code(),
            WalletError::KeyIdMismatch.code(),
            WalletError::UndefinedAlgorithm.code(),
        ];
        let unique: std::collections::HashSet<_> = codes.iter().collect();
        assert_eq!(unique.len(), codes.len());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(WalletError::PrivateKeyMissing.to_string(), "Private key is missing");
        let err = VerificationError::from(VerificationFailure::Expired);
        assert_eq!(err.to_string(), "Token verification failed: token expired");
    }
}
