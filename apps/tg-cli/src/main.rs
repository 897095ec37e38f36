//! # tg-cli
//!
//! Policy bundle signing for toolgate.
//!
//! ```text
//! tg-cli gen-key --out-dir ./keys
//! tg-cli sign bundle.yaml --private-key ./keys/toolgate_policy_private.key
//! tg-cli verify bundle.yaml --public-key ./keys/toolgate_policy_public.key \
//!     --signature bundle.yaml.sig
//! ```
//!
//! Keys are base64 text files: the private key a PKCS#8 Ed25519 document,
//! the public key the raw 32-byte point — the same string `policy/apply`
//! expects in `pubkey_b64`.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};

const PRIVATE_KEY_FILE: &str = "toolgate_policy_private.key";
const PUBLIC_KEY_FILE: &str = "toolgate_policy_public.key";

/// toolgate policy signing tool.
#[derive(Parser)]
#[command(name = "tg-cli", about = "Sign and verify toolgate policy bundles")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a new Ed25519 signing keypair.
    GenKey {
        /// Directory to write the key files into.
        #[arg(long)]
        out_dir: PathBuf,
    },
    /// Sign a bundle, writing `<bundle>.sig` (or --out).
    Sign {
        /// Bundle file to sign.
        bundle: PathBuf,
        /// Private key file (base64 PKCS#8).
        #[arg(long)]
        private_key: PathBuf,
        /// Output envelope path.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Verify a bundle against its signature envelope.
    Verify {
        /// Bundle file to verify.
        bundle: PathBuf,
        /// Public key file (base64 raw 32 bytes).
        #[arg(long)]
        public_key: PathBuf,
        /// Signature envelope path.
        #[arg(long)]
        signature: PathBuf,
    },
}

fn main() -> Result<()> {
    match Cli::parse().command {
        Command::GenKey { out_dir } => gen_key(&out_dir),
        Command::Sign {
            bundle,
            private_key,
            out,
        } => sign(&bundle, &private_key, out.as_deref()),
        Command::Verify {
            bundle,
            public_key,
            signature,
        } => verify(&bundle, &public_key, &signature),
    }
}

fn gen_key(out_dir: &Path) -> Result<()> {
    let keypair = tg_signing::generate_keypair().context("generating keypair")?;
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;
    std::fs::write(out_dir.join(PRIVATE_KEY_FILE), &keypair.private_b64)?;
    std::fs::write(out_dir.join(PUBLIC_KEY_FILE), &keypair.public_b64)?;
    println!("Wrote keys to {}", out_dir.display());
    Ok(())
}

fn sign(bundle: &Path, private_key: &Path, out: Option<&Path>) -> Result<()> {
    let private_b64 = std::fs::read_to_string(private_key)
        .with_context(|| format!("reading {}", private_key.display()))?;
    let keypair = tg_signing::sign::load_keypair(&private_b64).context("loading private key")?;

    let payload =
        std::fs::read(bundle).with_context(|| format!("reading {}", bundle.display()))?;
    let envelope = tg_signing::sign_payload(&keypair, &payload);

    let out_path = out
        .map(Path::to_path_buf)
        .unwrap_or_else(|| bundle.with_extension("yaml.sig"));
    std::fs::write(&out_path, envelope.to_json())
        .with_context(|| format!("writing {}", out_path.display()))?;
    println!("Wrote signature: {}", out_path.display());
    Ok(())
}

fn verify(bundle: &Path, public_key: &Path, signature: &Path) -> Result<()> {
    let public_b64 = std::fs::read_to_string(public_key)
        .with_context(|| format!("reading {}", public_key.display()))?;
    match tg_signing::verify_bundle(bundle, signature, public_b64.trim()) {
        Ok(()) => {
            println!("OK");
            Ok(())
        }
        Err(e) => {
            eprintln!("Signature verification failed: {e}");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gen_sign_verify_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let keys = dir.path().join("keys");
        gen_key(&keys).unwrap();

        let bundle = dir.path().join("bundle.yaml");
        std::fs::write(&bundle, "defaults:\n  decision: deny\n").unwrap();
        sign(&bundle, &keys.join(PRIVATE_KEY_FILE), None).unwrap();

        let sig = dir.path().join("bundle.yaml.sig");
        assert!(sig.exists());
        verify(&bundle, &keys.join(PUBLIC_KEY_FILE), &sig).unwrap();
    }
}
