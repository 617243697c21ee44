//! Meritnet node runtime.
//!
//! Wires the shared services together and drives the periodic block
//! production loop until shutdown.

use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};
use tracing_subscriber::FmtSubscriber;

use meritnet::{
    auction::AuctionManager,
    config::NodeConfig,
    crypto::{Keypair, SecretKey},
    ledger::{Blockchain, ChainStore},
    reputation::{DecayingTrust, ReputationEngine},
    routing::{PeerContact, PeerDirectory},
    types::NodeId,
};

/// Get the default data directory
fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".meritnet")
}

/// Load the node identity from a PEM file, generating and saving a
/// fresh one on first start
fn load_or_create_keypair(path: &Path) -> anyhow::Result<Keypair> {
    if path.exists() {
        let pem = fs::read_to_string(path)?;
        let secret = SecretKey::from_pkcs8_pem(&pem)?;
        let keypair = Keypair::from_secret(secret)?;
        info!("Loaded identity from {:?}", path);
        return Ok(keypair);
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    info!("Generating a new RSA-2048 identity (this can take a moment)...");
    let keypair = Keypair::generate()?;
    fs::write(path, keypair.secret_key().to_pkcs8_pem()?)?;

    // Restrictive permissions (Unix only)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));
    }

    info!("Identity saved to {:?}", path);
    Ok(keypair)
}

/// Command-line overrides applied on top of the config file
struct NodeArgs {
    config_path: Option<PathBuf>,
    port: Option<u16>,
    data_dir: Option<PathBuf>,
}

fn parse_args(args: &[String]) -> NodeArgs {
    let mut parsed = NodeArgs {
        config_path: None,
        port: None,
        data_dir: None,
    };

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                i += 1;
                if i < args.len() {
                    parsed.config_path = Some(PathBuf::from(&args[i]));
                }
            }
            "--port" | "-p" => {
                i += 1;
                if i < args.len() {
                    parsed.port = args[i].parse().ok();
                }
            }
            "--data-dir" => {
                i += 1;
                if i < args.len() {
                    parsed.data_dir = Some(PathBuf::from(&args[i]));
                }
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => {}
        }
        i += 1;
    }

    parsed
}

fn print_help() {
    println!("Meritnet Node");
    println!();
    println!("USAGE:");
    println!("    meritnet node [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -c, --config <PATH>    Load settings from a TOML file");
    println!("    -p, --port <PORT>      Listen port (default: 9000)");
    println!("    --data-dir <PATH>      Chain and identity directory (default: ~/.meritnet)");
    println!("    -h, --help             Print help");
}

#[tokio::main]
pub async fn run(args: Vec<String>) -> anyhow::Result<()> {
    let overrides = parse_args(&args);

    // Initialize logging with EnvFilter to support RUST_LOG
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = match &overrides.config_path {
        Some(path) => NodeConfig::load_from_file(path)?,
        None => NodeConfig::default(),
    };
    if let Some(port) = overrides.port {
        config.listen_port = port;
    }
    if let Some(dir) = overrides.data_dir {
        config.data_dir = Some(dir);
    }

    println!();
    println!("   Meritnet v{}", meritnet::VERSION);
    println!("   Trust-weighted auction ledger");
    println!();

    let data_dir = config.data_dir.clone().unwrap_or_else(data_dir);
    fs::create_dir_all(&data_dir)?;
    let key_file = config
        .key_file
        .clone()
        .unwrap_or_else(|| data_dir.join("identity.pem"));
    let keypair = Arc::new(load_or_create_keypair(&key_file)?);
    let local_id = NodeId::from_public_key(keypair.public_key());
    info!(id = %local_id, port = config.listen_port, "node identity ready");

    let reputation = Arc::new(ReputationEngine::default());
    let peer_trust = Arc::new(DecayingTrust::new());
    let directory = PeerDirectory::new(local_id, Arc::clone(&peer_trust));

    let mut chain =
        Blockchain::with_store(Arc::clone(&reputation), ChainStore::in_dir(&data_dir))?;
    chain.set_consensus(config.initial_consensus);
    let chain = Arc::new(RwLock::new(chain));

    let manager = AuctionManager::new(
        Arc::clone(&chain),
        Arc::clone(&reputation),
        Arc::clone(&keypair),
        local_id.to_hex(),
        config.penalties.clone(),
    );

    for entry in &config.bootstrap_peers {
        let id = match NodeId::from_hex(&entry.id) {
            Ok(id) => id,
            Err(error) => {
                warn!(peer = %entry.id, %error, "skipping bootstrap peer: bad id");
                continue;
            }
        };
        let host: IpAddr = match entry.host.parse() {
            Ok(host) => host,
            Err(error) => {
                warn!(peer = %entry.id, %error, "skipping bootstrap peer: bad address");
                continue;
            }
        };
        if let Err(error) = directory.admit(PeerContact::new(id, host, entry.port)) {
            warn!(peer = %entry.id, %error, "bootstrap peer refused");
        }
    }
    info!(peers = directory.len(), "peer directory ready");
    {
        let chain = chain.read().await;
        info!(
            engine = chain.active_consensus().name(),
            height = chain.len(),
            "ledger ready"
        );
    }

    // Drain queued transactions into blocks on a fixed cadence until
    // Ctrl-C; the flag aborts any search still running at shutdown
    let mining_cancel = Arc::new(AtomicBool::new(false));
    let mut ticker = tokio::time::interval(std::time::Duration::from_millis(
        config.mining_interval_ms,
    ));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    info!(
        interval_ms = config.mining_interval_ms,
        "node running, press Ctrl-C to stop"
    );
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match manager.flush_pending(&mining_cancel).await {
                    Ok(Some(block)) => {
                        info!(
                            hash = %block.hash,
                            transactions = block.transactions.len(),
                            "scheduled block committed"
                        );
                    }
                    Ok(None) => {}
                    Err(error) => warn!(%error, "scheduled block refused"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                mining_cancel.store(true, Ordering::Relaxed);
                info!("shutdown requested, abandoning any in-flight mining");
                break;
            }
        }
    }

    Ok(())
}
