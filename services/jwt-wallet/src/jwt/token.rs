//! Type-state token.
//!
//! A token moves from [`Unverified`] through [`SignatureVerified`] to
//! [`Verified`]; claims are only handed out once every check has passed.

use jsonwebtoken::{decode, decode_header, Algorithm, Header, Validation};

use crate::error::VerificationFailure;
use crate::jwt::claims::Claims;
use crate::resolver::KeyResolver;

mod private {
    pub trait Sealed {}
}

/// Marker trait for token verification states.
pub trait TokenState: private::Sealed {
    /// State name for logs
    fn state_name() -> &'static str;
}

/// Header parsed, nothing checked.
#[derive(Debug)]
pub struct Unverified;
impl private::Sealed for Unverified {}
impl TokenState for Unverified {
    fn state_name() -> &'static str {
        "Unverified"
    }
}

/// Signature checked against a resolved key.
#[derive(Debug)]
pub struct SignatureVerified {
    claims: Claims,
}
impl private::Sealed for SignatureVerified {}
impl TokenState for SignatureVerified {
    fn state_name() -> &'static str {
        "SignatureVerified"
    }
}

/// Signature and time/audience claims checked.
#[derive(Debug)]
pub struct Verified {
    claims: Claims,
}
impl private::Sealed for Verified {}
impl TokenState for Verified {
    fn state_name() -> &'static str {
        "Verified"
    }
}

/// Compact JWS in a given verification state.
#[derive(Debug)]
pub struct Token<State: TokenState> {
    raw: String,
    header: Header,
    state: State,
}

impl Token<Unverified> {
    /// Parses the protected header.
    ///
    /// # Errors
    ///
    /// Returns [`VerificationFailure::Malformed`] when the header cannot be
    /// decoded or names an algorithm that is not supported, `none` included.
    pub fn parse(raw: &str) -> Result<Self, VerificationFailure> {
        let header = decode_header(raw).map_err(|e| VerificationFailure::Malformed {
            reason: format!("Invalid header: {e}"),
        })?;

        Ok(Self {
            raw: raw.to_string(),
            header,
            state: Unverified,
        })
    }

    /// Key ID from the header.
    #[must_use]
    pub fn kid(&self) -> Option<&str> {
        self.header.kid.as_deref()
    }

    /// Algorithm from the header.
    #[must_use]
    pub const fn algorithm(&self) -> Algorithm {
        self.header.alg
    }

    /// Resolves the verification key and checks the signature.
    ///
    /// # Errors
    ///
    /// Returns the resolution failure, or a signature/algorithm failure.
    pub async fn verify_signature(
        self,
        resolver: &KeyResolver,
    ) -> Result<Token<SignatureVerified>, VerificationFailure> {
        let key = resolver
            .resolve(self.kid(), Some(self.header.alg))
            .await?;

        if !key.jwk().accepts(self.header.alg) {
            return Err(VerificationFailure::InvalidAlgorithm);
        }

        // Time and audience checks happen in `validate_claims` without leeway.
        let mut validation = Validation::new(self.header.alg);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.required_spec_claims.clear();

        let data = decode::<Claims>(&self.raw, key.decoding_key(), &validation)?;

        Ok(Token {
            raw: self.raw,
            header: self.header,
            state: SignatureVerified {
                claims: data.claims,
            },
        })
    }
}

impl Token<SignatureVerified> {
    /// Checks `exp`, `nbf` and `aud` against `now` (seconds since epoch).
    ///
    /// # Errors
    ///
    /// Returns the first failing check.
    pub fn validate_claims(
        self,
        audience: &str,
        now: i64,
    ) -> Result<Token<Verified>, VerificationFailure> {
        let claims = &self.state.claims;

        let exp = claims.exp.ok_or_else(|| VerificationFailure::MissingClaim {
            claim: "exp".to_string(),
        })?;
        if exp <= now {
            return Err(VerificationFailure::Expired);
        }

        if claims.nbf.is_some_and(|nbf| nbf > now) {
            return Err(VerificationFailure::NotYetValid);
        }

        let aud = claims
            .aud
            .as_ref()
            .ok_or_else(|| VerificationFailure::MissingClaim {
                claim: "aud".to_string(),
            })?;
        if !aud.contains(audience) {
            return Err(VerificationFailure::AudienceMismatch);
        }

        Ok(Token {
            raw: self.raw,
            header: self.header,
            state: Verified {
                claims: self.state.claims,
            },
        })
    }

    /// Claims whose signature is valid but which are not yet checked.
    #[must_use]
    pub const fn peek_claims(&self) -> &Claims {
        &self.state.claims
    }
}

impl Token<Verified> {
    /// Verified claims.
    #[must_use]
    pub const fn claims(&self) -> &Claims {
        &self.state.claims
    }

    /// Consumes the token, returning its claims.
    #[must_use]
    pub fn into_claims(self) -> Claims {
        self.state.claims
    }

    /// Raw compact form.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Protected header.
    #[must_use]
    pub const fn header(&self) -> &Header {
        &self.header
    }
}

impl<S: TokenState> Token<S> {
    /// Current state name.
    #[must_use]
    pub fn state_name(&self) -> &'static str {
        S::state_name()
    }
}
