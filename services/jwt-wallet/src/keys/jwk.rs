//! JSON Web Key documents.

use std::str::FromStr;

use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::WalletError;

/// JSON Web Key, public or private.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Jwk {
    /// Key type (EC, RSA, OKP, oct)
    pub kty: String,
    /// Key ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    /// Key use (sig, enc)
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    /// Algorithm
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    /// EC / OKP curve
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
    /// EC x coordinate / OKP public key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    /// EC y coordinate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
    /// RSA modulus
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    /// RSA exponent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
    /// Private scalar (EC, OKP, RSA)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,
    /// Symmetric key value (oct)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k: Option<String>,
}

impl std::fmt::Debug for Jwk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Jwk")
            .field("kty", &self.kty)
            .field("kid", &self.kid)
            .field("use", &self.key_use)
            .field("alg", &self.alg)
            .field("crv", &self.crv)
            .field("private", &self.is_private())
            .finish_non_exhaustive()
    }
}

impl Jwk {
    /// Whether this key carries private or secret material.
    #[must_use]
    pub const fn is_private(&self) -> bool {
        self.d.is_some() || self.k.is_some()
    }

    /// Public half of an asymmetric key. Symmetric keys have none.
    #[must_use]
    pub fn to_public(&self) -> Option<Self> {
        if self.kty == "oct" {
            return None;
        }
        let mut public = self.clone();
        public.d = None;
        Some(public)
    }

    /// Returns a copy tagged for signing with the given kid and algorithm.
    #[must_use]
    pub fn tagged(&self, kid: &str, algorithm: Algorithm) -> Self {
        let mut tagged = self.clone();
        tagged.kid = Some(kid.to_string());
        tagged.alg = Some(algorithm_name(algorithm));
        tagged.key_use = Some("sig".to_string());
        tagged
    }

    /// Parsed `alg` member, if present.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::UnsupportedAlgorithm`] for unknown algorithm names.
    pub fn algorithm(&self) -> Result<Option<Algorithm>, WalletError> {
        self.alg.as_deref().map(parse_algorithm).transpose()
    }

    /// Whether a token signed with `algorithm` could be verified with this key.
    ///
    /// Only signature keys qualify. HMAC is never accepted: a key set is
    /// public, so a symmetric entry would let any reader forge tokens.
    #[must_use]
    pub fn accepts(&self, algorithm: Algorithm) -> bool {
        if self.key_use.as_deref().is_some_and(|key_use| key_use != "sig") {
            return false;
        }
        if matches!(
            algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return false;
        }
        if let Ok(Some(bound)) = self.algorithm() {
            return bound == algorithm;
        }
        match self.kty.as_str() {
            "EC" => matches!(algorithm, Algorithm::ES256 | Algorithm::ES384),
            "RSA" => matches!(
                algorithm,
                Algorithm::RS256
                    | Algorithm::RS384
                    | Algorithm::RS512
                    | Algorithm::PS256
                    | Algorithm::PS384
                    | Algorithm::PS512
            ),
            "OKP" => algorithm == Algorithm::EdDSA,
            _ => false,
        }
    }
}

/// JSON Web Key Set document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwks {
    /// List of keys
    pub keys: Vec<Jwk>,
}

impl Jwks {
    /// Serializes the set to its JSON document form.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Header name of an algorithm.
#[must_use]
pub fn algorithm_name(algorithm: Algorithm) -> String {
    format!("{algorithm:?}")
}

/// Parses a JOSE algorithm name.
///
/// # Errors
///
/// Returns [`WalletError::UnsupportedAlgorithm`] for unknown names.
pub fn parse_algorithm(name: &str) -> Result<Algorithm, WalletError> {
    Algorithm::from_str(name).map_err(|_| WalletError::UnsupportedAlgorithm {
        algorithm: name.to_string(),
    })
}
