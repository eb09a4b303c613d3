//! Token signing, parsing and verification.

pub mod claims;
pub mod signer;
pub mod token;
pub mod verifier;

pub use claims::{Audience, Claims, UNKNOWN_AUDIENCE};
pub use signer::TokenSigner;
pub use token::{SignatureVerified, Token, TokenState, Unverified, Verified};
pub use verifier::TokenVerifier;
