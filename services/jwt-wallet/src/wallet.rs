//! Wallet facade.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::WalletConfig;
use crate::error::WalletError;
use crate::jwt::{Claims, TokenSigner, TokenVerifier};
use crate::keys::{JoseKeyCodec, Jwks, KeyCodec};
use crate::provisioning::{ProvisioningController, ProvisioningMode};

/// Signs and verifies tokens with keys provisioned at construction.
///
/// Construction runs provisioning to completion, so every `Wallet` value is
/// ready to use. Share it behind an `Arc`.
#[derive(Debug)]
pub struct Wallet {
    mode: ProvisioningMode,
    issuer: Option<String>,
    signer: TokenSigner,
    verifier: TokenVerifier,
}

impl Wallet {
    /// Provisions a wallet with the default key codec.
    ///
    /// # Errors
    ///
    /// Returns any provisioning failure, including
    /// [`WalletError::SaveTokenExit`] in persist-and-exit mode.
    pub fn new(config: WalletConfig) -> Result<Self, WalletError> {
        Self::with_codec(config, Arc::new(JoseKeyCodec))
    }

    /// Provisions a wallet with a custom key codec.
    ///
    /// # Errors
    ///
    /// See [`Wallet::new`].
    pub fn with_codec(config: WalletConfig, codec: Arc<dyn KeyCodec>) -> Result<Self, WalletError> {
        let provisioned = ProvisioningController::new(config, codec).run()?;

        Ok(Self {
            signer: TokenSigner::new(provisioned.key_material, provisioned.issuer.clone()),
            verifier: TokenVerifier::new(provisioned.resolver),
            mode: provisioned.mode,
            issuer: provisioned.issuer,
        })
    }

    /// Signs `claims` as a token expiring at `expires_at`.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::PrivateKeyMissing`] for a verification-only wallet.
    pub fn sign_token(
        &self,
        claims: &Claims,
        expires_at: DateTime<Utc>,
    ) -> Result<String, WalletError> {
        self.signer.sign(claims, expires_at)
    }

    /// Verifies a token for `audience` and returns its claims.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::KeyResolution`] when the key source is down and
    /// [`WalletError::Verification`] for any other failed check.
    pub async fn verify_token(&self, token: &str, audience: &str) -> Result<Claims, WalletError> {
        Ok(self.verifier.verify(token, audience).await?)
    }

    /// Selected provisioning mode.
    #[must_use]
    pub const fn mode(&self) -> &ProvisioningMode {
        &self.mode
    }

    /// Issuer written to signed tokens.
    #[must_use]
    pub fn issuer(&self) -> Option<&str> {
        self.issuer.as_deref()
    }

    /// Key ID of the signing key.
    #[must_use]
    pub fn key_id(&self) -> Option<&str> {
        self.signer.key_id()
    }

    /// Whether this wallet can sign.
    #[must_use]
    pub const fn can_sign(&self) -> bool {
        self.signer.can_sign()
    }

    /// Public JWKS for locally held verification keys.
    #[must_use]
    pub fn public_jwks(&self) -> Option<Jwks> {
        self.verifier.resolver().local_jwks()
    }
}
