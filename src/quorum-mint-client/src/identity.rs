use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use solana_sdk::signature::{read_keypair_file, Keypair, Signer};
use std::path::Path;

/// The operator's signing identity and where it came from.
pub enum ResolvedIdentity {
    /// Loaded from the keypair file named by the CLI config.
    Configured { keypair: Keypair, keypair_path: String },
    /// Generated in memory because no configured identity could be loaded.
    /// It holds no funds.
    Ephemeral { keypair: Keypair, reason: String },
}

impl ResolvedIdentity {
    pub fn keypair(&self) -> &Keypair {
        match self {
            ResolvedIdentity::Configured { keypair, .. } => keypair,
            ResolvedIdentity::Ephemeral { keypair, .. } => keypair,
        }
    }

    pub fn into_keypair(self) -> Keypair {
        match self {
            ResolvedIdentity::Configured { keypair, .. } => keypair,
            ResolvedIdentity::Ephemeral { keypair, .. } => keypair,
        }
    }
}

/// Loads the identity named by the Solana CLI config at `config_path`, or at
/// the CLI's default location when `None`. Never fails: any problem yields
/// an ephemeral identity.
pub fn resolve(config_path: Option<&Path>) -> ResolvedIdentity {
    match load_configured_keypair(config_path) {
        Ok((keypair, keypair_path)) => {
            info!("using identity {} from {}", keypair.pubkey(), keypair_path);
            ResolvedIdentity::Configured {
                keypair,
                keypair_path,
            }
        }
        Err(e) => {
            let keypair = Keypair::new();
            let reason = format!("{:#}", e);
            warn!(
                "unable to load configured identity ({}); using ephemeral identity {}",
                reason,
                keypair.pubkey()
            );
            ResolvedIdentity::Ephemeral { keypair, reason }
        }
    }
}

fn load_configured_keypair(config_path: Option<&Path>) -> Result<(Keypair, String)> {
    let config_file = match config_path {
        Some(path) => path
            .to_str()
            .ok_or_else(|| anyhow!("config path {} is not valid UTF-8", path.display()))?
            .to_string(),
        None => solana_cli_config::CONFIG_FILE
            .as_ref()
            .ok_or_else(|| anyhow!("config file path"))?
            .clone(),
    };

    let cli_config = solana_cli_config::Config::load(&config_file)
        .with_context(|| format!("unable to load config file {}", config_file))?;

    let keypair = read_keypair_file(&cli_config.keypair_path)
        .map_err(|e| anyhow!("{}", e))
        .with_context(|| format!("unable to read keypair file {}", cli_config.keypair_path))?;

    Ok((keypair, cli_config.keypair_path))
}
