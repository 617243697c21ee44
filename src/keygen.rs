//! Identity generation utility for Meritnet
//!
//! Generates the RSA-2048 keypair a node signs blocks and
//! transactions with, and prints the derived identity.
//!
//! Usage:
//!   meritnet keygen              Generate into the default data dir
//!   meritnet keygen --out <DIR>  Generate into a specific directory

use std::fs;
use std::path::PathBuf;

use meritnet::crypto::Keypair;
use meritnet::types::NodeId;

pub fn run(args: &[String]) {
    let mut out_dir: Option<PathBuf> = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--out" | "-o" => {
                i += 1;
                if i < args.len() {
                    out_dir = Some(PathBuf::from(&args[i]));
                }
            }
            "--help" | "-h" => {
                print_help();
                return;
            }
            _ => {}
        }
        i += 1;
    }

    let out_dir = out_dir.unwrap_or_else(|| {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".meritnet")
    });
    let key_path = out_dir.join("identity.pem");

    if key_path.exists() {
        eprintln!("An identity already exists at {}", key_path.display());
        eprintln!("To generate a new one, first back up and remove the existing file.");
        std::process::exit(1);
    }

    println!("Generating new Meritnet identity...");
    println!("----------------------------------------------------------------");

    let keypair = match Keypair::generate() {
        Ok(keypair) => keypair,
        Err(e) => {
            eprintln!("Key generation failed: {}", e);
            std::process::exit(1);
        }
    };

    let pem = match keypair.secret_key().to_pkcs8_pem() {
        Ok(pem) => pem,
        Err(e) => {
            eprintln!("Key encoding failed: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = fs::create_dir_all(&out_dir).and_then(|()| fs::write(&key_path, pem)) {
        eprintln!("Failed to save identity: {}", e);
        std::process::exit(1);
    }

    // Restrictive permissions (Unix only)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(&key_path, fs::Permissions::from_mode(0o600));
    }

    let node_id = NodeId::from_public_key(keypair.public_key());

    println!("Node ID:");
    println!("{}", node_id.to_hex());
    println!();
    println!("Public Key (Base64) — share this with peers:");
    println!("{}", keypair.public_key().to_base64());
    println!("----------------------------------------------------------------");
    println!("Identity saved to: {}", key_path.display());
    println!("Keep the key file private; anyone holding it can sign as this node.");
}

fn print_help() {
    println!("Meritnet Keygen");
    println!();
    println!("USAGE:");
    println!("    meritnet keygen [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -o, --out <DIR>    Directory for identity.pem (default: ~/.meritnet)");
    println!("    -h, --help         Print help");
}
