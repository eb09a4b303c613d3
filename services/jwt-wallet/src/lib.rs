//! JWT wallet: signing key provisioning, token issuance and verification.
//!
//! A [`Wallet`] is built once from a [`WalletConfig`]. Construction decides
//! where verification keys come from (a remote JWKS endpoint, a development
//! public key, or a key pair generated at startup) and whether a signing key
//! is installed. After that the wallet signs claim sets into compact JWS
//! tokens and verifies tokens for an expected audience.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod jwt;
pub mod keys;
pub mod provisioning;
pub mod resolver;
pub mod telemetry;
pub mod wallet;

pub use config::{ConfigError, WalletConfig};
pub use error::{KeyResolutionError, VerificationError, VerificationFailure, WalletError};
pub use jwt::{Audience, Claims};
pub use keys::{JoseKeyCodec, KeyCodec, PersistedKeys};
pub use provisioning::ProvisioningMode;
pub use wallet::Wallet;
