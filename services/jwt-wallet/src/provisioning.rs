//! Startup key provisioning.
//!
//! Two independent decisions are made from [`WalletConfig`]: where
//! verification keys come from ([`ProvisioningMode`]) and whether a signing
//! key is installed. A configured private key always wins for signing; a key
//! generated for verification is only used to sign when nothing is configured.

use std::fmt;
use std::sync::Arc;

use jsonwebtoken::Algorithm;
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::{self, WalletConfig};
use crate::error::WalletError;
use crate::keys::{
    decode_key_document, jwk_from_document, parse_algorithm, Jwks, KeyCodec, KeyMaterial,
};
use crate::resolver::{KeyResolver, LocalJwkSet, RemoteJwkSet};

/// Algorithm used for keys generated at startup.
pub const DEVELOPMENT_ALGORITHM: Algorithm = Algorithm::ES256;

/// Where verification keys come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisioningMode {
    /// Keys fetched from `{issuer}/.well-known/jwks.json`.
    Remote {
        /// Configured issuer
        issuer: String,
    },
    /// A single public key supplied for local development.
    DevPublic {
        /// Local development issuer
        issuer: String,
    },
    /// Keys generated in memory for tests; nothing is persisted.
    Ephemeral,
    /// Keys generated, logged for the operator to save, then startup aborts.
    PersistedExit {
        /// Configured development port
        port: u16,
    },
}

impl ProvisioningMode {
    /// Selects the mode for a configuration.
    #[must_use]
    pub fn select(config: &WalletConfig) -> Self {
        match (&config.issuer, &config.dev_public_key, config.dev_port) {
            (Some(issuer), _, _) => Self::Remote {
                issuer: issuer.clone(),
            },
            (None, Some(_), _) => Self::DevPublic {
                issuer: config.dev_issuer(),
            },
            (None, None, None) => Self::Ephemeral,
            (None, None, Some(port)) => Self::PersistedExit { port },
        }
    }

    /// Issuer placed in signed tokens, if any.
    #[must_use]
    pub fn issuer(&self) -> Option<&str> {
        match self {
            Self::Remote { issuer } | Self::DevPublic { issuer } => Some(issuer),
            Self::Ephemeral | Self::PersistedExit { .. } => None,
        }
    }

    /// Short name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Remote { .. } => "remote",
            Self::DevPublic { .. } => "dev_public",
            Self::Ephemeral => "ephemeral",
            Self::PersistedExit { .. } => "persisted_exit",
        }
    }
}

impl fmt::Display for ProvisioningMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.issuer() {
            Some(issuer) => write!(f, "{} ({issuer})", self.name()),
            None => f.write_str(self.name()),
        }
    }
}

/// Result of a successful provisioning run.
#[derive(Debug)]
pub struct Provisioned {
    /// Selected verification mode
    pub mode: ProvisioningMode,
    /// Verification key source
    pub resolver: KeyResolver,
    /// Installed signing key
    pub key_material: Option<KeyMaterial>,
    /// Issuer for signed tokens
    pub issuer: Option<String>,
}

/// Runs the provisioning state machine once.
pub struct ProvisioningController {
    config: WalletConfig,
    codec: Arc<dyn KeyCodec>,
}

impl ProvisioningController {
    /// Creates a controller for `config`.
    #[must_use]
    pub fn new(config: WalletConfig, codec: Arc<dyn KeyCodec>) -> Self {
        Self { config, codec }
    }

    /// Provisions verification and signing keys.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::SaveTokenExit`] in persist-and-exit mode, and
    /// key, algorithm or configuration errors for unusable settings.
    pub fn run(&self) -> Result<Provisioned, WalletError> {
        self.config.validate()?;
        let mode = ProvisioningMode::select(&self.config);

        let (resolver, generated) = match &mode {
            ProvisioningMode::Remote { issuer } => (self.remote_resolver(issuer)?, None),
            ProvisioningMode::DevPublic { issuer } => (self.dev_resolver(issuer)?, None),
            ProvisioningMode::Ephemeral => {
                let (set, material) = self.generate()?;
                warn!("Assuming testing. Using generated public/private keys");
                (KeyResolver::Generated(set), Some(material))
            }
            ProvisioningMode::PersistedExit { port } => {
                let (_, material) = self.generate()?;
                let keys = material.export()?;
                error!(
                    port,
                    kid = %keys.key_id,
                    "Please save these values to your .env.local file and restart the server\n{}",
                    keys.env_lines()
                );
                return Err(WalletError::SaveTokenExit {
                    keys: Box::new(keys),
                });
            }
        };

        let key_material = match (self.configured_key()?, generated) {
            (Some(configured), Some(generated)) => {
                warn!(
                    configured_kid = %configured.key_id(),
                    generated_kid = %generated.key_id(),
                    "Private key configured without a public key source; tokens signed with it will not verify locally"
                );
                Some(configured)
            }
            (Some(configured), None) => Some(configured),
            (None, generated @ Some(_)) => generated,
            (None, None) => {
                warn!("Wallet does not have a private key and will not be able to sign tokens");
                None
            }
        };

        info!(
            mode = %mode,
            resolver = resolver.kind(),
            can_sign = key_material.is_some(),
            "Key provisioning complete"
        );

        Ok(Provisioned {
            issuer: mode.issuer().map(str::to_string),
            mode,
            resolver,
            key_material,
        })
    }

    fn remote_resolver(&self, issuer: &str) -> Result<KeyResolver, WalletError> {
        let jwks_url = config::jwks_url(issuer)?;
        info!(issuer = %issuer, jwks_url = %jwks_url, "Using remote JWKS");
        let remote = RemoteJwkSet::new(jwks_url, &self.config, Arc::clone(&self.codec))?;
        Ok(KeyResolver::RemoteSet(remote))
    }

    fn dev_resolver(&self, issuer: &str) -> Result<KeyResolver, WalletError> {
        let encoded = self
            .config
            .dev_public_key
            .as_deref()
            .ok_or(WalletError::KeyMissing)?;
        let jwk = jwk_from_document(
            "dev_public_key",
            decode_key_document("dev_public_key", encoded)?,
        )?;
        let set = LocalJwkSet::new(&Jwks { keys: vec![jwk] }, self.codec.as_ref())?;

        warn!(issuer = %issuer, "Using development JWKS");
        warn!("Please do not use this in production. This will not be secure.");
        Ok(KeyResolver::LocalSet(set))
    }

    /// Generates a development key pair with a random kid.
    fn generate(&self) -> Result<(LocalJwkSet, KeyMaterial), WalletError> {
        let pair = self.codec.generate(DEVELOPMENT_ALGORITHM)?;
        let kid = Uuid::new_v4().to_string();

        let public = pair.public.tagged(&kid, DEVELOPMENT_ALGORITHM);
        let set = LocalJwkSet::new(
            &Jwks {
                keys: vec![public],
            },
            self.codec.as_ref(),
        )?;

        let key = self.codec.signing_key(&pair.private, DEVELOPMENT_ALGORITHM)?;
        let material = KeyMaterial::new(key, DEVELOPMENT_ALGORITHM, kid, pair.private)
            .with_public_key(pair.public);
        Ok((set, material))
    }

    /// Imports the configured private key, if any.
    fn configured_key(&self) -> Result<Option<KeyMaterial>, WalletError> {
        let Some(encoded) = self.config.private_key.as_deref() else {
            return Ok(None);
        };

        let document = decode_key_document("private_key", encoded)?;
        let kid = document
            .get("kid")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(WalletError::KeyIdMismatch)?;
        let algorithm = parse_algorithm(
            document
                .get("alg")
                .and_then(Value::as_str)
                .ok_or(WalletError::UndefinedAlgorithm)?,
        )?;

        let jwk = jwk_from_document("private_key", document)?;
        let key = self.codec.signing_key(&jwk, algorithm)?;

        info!(kid = %kid, algorithm = ?algorithm, "Using private key with kid");

        let public = jwk.to_public();
        let material = KeyMaterial::new(key, algorithm, kid, jwk);
        Ok(Some(match public {
            Some(public) => material.with_public_key(public),
            None => material,
        }))
    }
}

impl fmt::Debug for ProvisioningController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvisioningController")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
