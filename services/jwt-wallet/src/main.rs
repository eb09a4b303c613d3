//! Provisions a wallet from the environment and prints its public JWKS.

use anyhow::Context;
use tracing::info;

use jwt_wallet::telemetry::{init_tracing, TracingConfig};
use jwt_wallet::{Wallet, WalletConfig};

fn main() -> anyhow::Result<()> {
    init_tracing(&TracingConfig::from_env());

    info!(version = env!("CARGO_PKG_VERSION"), "Starting JWT wallet");

    let config = WalletConfig::from_env().context("invalid wallet configuration")?;
    let wallet = Wallet::new(config).context("key provisioning failed")?;

    info!(
        mode = %wallet.mode(),
        kid = ?wallet.key_id(),
        can_sign = wallet.can_sign(),
        "Wallet ready"
    );

    if let Some(jwks) = wallet.public_jwks() {
        println!("{}", jwks.to_json());
    }

    Ok(())
}
