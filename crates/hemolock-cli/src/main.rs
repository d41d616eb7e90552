//! Hemolock CLI - Operator tooling for the donor portal PIN subsystem
//!
//! Exercises the setup / login / change / reset flows against the real
//! file-backed store and installation identity, for support staff and
//! local debugging. The identity cache file is normally written by the
//! registration flow; `cache-identity` seeds it by hand.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Local, TimeZone};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hemolock_core::{
    strength_score, AuthError, AuthStatus, CachedIdentity, CredentialStore, FileBackend,
    FileIdentityCache, IdentityClaim, InstallationIdentity, PinAuthenticator, SecurityPolicy,
    SystemClock,
};

/// Hemolock - local PIN authentication for the donor portal
#[derive(Parser)]
#[command(name = "hemolock")]
#[command(about = "Device-bound PIN authentication tooling", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Data directory for the envelope, device id, and identity cache
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current credential status
    Status,

    /// Set up a new PIN credential
    Setup {
        /// New PIN
        #[arg(long)]
        pin: String,

        /// Confirmation of the new PIN
        #[arg(long)]
        confirm: String,

        /// Subject id; defaults to the cached identity's external id
        #[arg(long)]
        subject: Option<String>,
    },

    /// Authenticate with the PIN
    Login {
        /// PIN to verify
        #[arg(long)]
        pin: String,
    },

    /// Change the PIN
    Change {
        /// Current PIN
        #[arg(long)]
        current: String,

        /// New PIN
        #[arg(long)]
        new: String,

        /// Confirmation of the new PIN
        #[arg(long)]
        confirm: String,
    },

    /// Identity-verified reset: deletes the credential entirely
    Reset {
        /// Claimed first name
        #[arg(long)]
        first_name: String,

        /// Claimed last name
        #[arg(long)]
        last_name: String,

        /// Claimed date of birth (as registered)
        #[arg(long)]
        date_of_birth: String,

        /// Claimed external donor id
        #[arg(long)]
        external_id: String,
    },

    /// Delete the local credential without identity verification
    /// (local wipe only; the lockout ledger goes with it)
    Forget,

    /// Score a candidate PIN without storing anything
    Score {
        /// Candidate PIN
        #[arg(long)]
        pin: String,
    },

    /// Seed the local identity cache (normally written by registration)
    CacheIdentity {
        /// Donor first name
        #[arg(long)]
        first_name: String,

        /// Donor last name
        #[arg(long)]
        last_name: String,

        /// Date of birth
        #[arg(long)]
        date_of_birth: String,

        /// External donor id
        #[arg(long)]
        external_id: String,
    },
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hemolock")
}

fn authenticator(data_dir: &PathBuf) -> PinAuthenticator {
    let store = CredentialStore::new(
        Arc::new(FileBackend::new(data_dir.join("pin_envelope.json"))),
        Arc::new(InstallationIdentity::new(data_dir.join("device_id"))),
        Arc::new(SystemClock),
    );
    PinAuthenticator::new(
        store,
        SecurityPolicy::default(),
        Arc::new(FileIdentityCache::new(data_dir.join("identity.json"))),
    )
}

fn format_instant(millis: i64) -> String {
    Local
        .timestamp_millis_opt(millis)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| millis.to_string())
}

fn print_auth_error(e: &AuthError) {
    match e {
        AuthError::LockedOut { expires_at } | AuthError::NowLocked { expires_at } => {
            eprintln!("{e} ({})", format_instant(*expires_at));
        }
        _ => eprintln!("{e}"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let data_dir = cli.data_dir.unwrap_or_else(default_data_dir);
    debug!("data dir: {}", data_dir.display());

    match cli.command {
        Commands::Status => {
            let auth = authenticator(&data_dir);
            match auth.status().await {
                AuthStatus::NoCredential => println!("No PIN is set up on this device"),
                AuthStatus::CredentialInactive => println!("PIN credential has been revoked"),
                AuthStatus::Unlocked { attempts_remaining } => {
                    println!("Ready ({attempts_remaining} attempts remaining)");
                }
                AuthStatus::Locked { expires_at } => {
                    println!("Locked until {}", format_instant(expires_at));
                }
            }
        }

        Commands::Setup {
            pin,
            confirm,
            subject,
        } => {
            let auth = authenticator(&data_dir);
            match auth.setup(&pin, &confirm, subject.as_deref()).await {
                Ok(outcome) if outcome.durable => {
                    println!("PIN set up for {}", outcome.subject_id);
                }
                Ok(outcome) => {
                    println!(
                        "PIN set up for {} (WARNING: not persisted; this device will forget it)",
                        outcome.subject_id
                    );
                }
                Err(e) => {
                    print_auth_error(&e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Login { pin } => {
            let auth = authenticator(&data_dir);
            match auth.authenticate(&pin).await {
                Ok(success) => {
                    println!("Authenticated as {}", success.subject_id);
                    if let Some(session) = success.session {
                        println!("Backing session established: {}", session.token);
                    }
                }
                Err(e) => {
                    print_auth_error(&e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Change {
            current,
            new,
            confirm,
        } => {
            let auth = authenticator(&data_dir);
            match auth.change_pin(&current, &new, &confirm).await {
                Ok(()) => println!("PIN changed"),
                Err(e) => {
                    print_auth_error(&e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Reset {
            first_name,
            last_name,
            date_of_birth,
            external_id,
        } => {
            let auth = authenticator(&data_dir);
            let claim = IdentityClaim {
                first_name,
                last_name,
                date_of_birth,
                external_id,
            };
            match auth.reset(&claim).await {
                Ok(()) => println!("Credential deleted; run setup to choose a new PIN"),
                Err(e) => {
                    print_auth_error(&e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Forget => {
            let store = CredentialStore::new(
                Arc::new(FileBackend::new(data_dir.join("pin_envelope.json"))),
                Arc::new(InstallationIdentity::new(data_dir.join("device_id"))),
                Arc::new(SystemClock),
            );
            store.clear().await;
            println!("Local credential removed");
        }

        Commands::Score { pin } => {
            let policy = SecurityPolicy::default();
            let score = strength_score(&pin, &policy);
            let report = hemolock_core::validate(&pin, &policy);
            println!("Strength: {score}/100");
            if !report.is_valid() {
                for error in &report.errors {
                    println!("  error: {error}");
                }
            }
            for warning in &report.warnings {
                println!("  warning: {warning}");
            }
        }

        Commands::CacheIdentity {
            first_name,
            last_name,
            date_of_birth,
            external_id,
        } => {
            let identity = CachedIdentity {
                first_name,
                last_name,
                date_of_birth,
                external_id,
            };
            std::fs::create_dir_all(&data_dir)
                .with_context(|| format!("creating {}", data_dir.display()))?;
            let path = data_dir.join("identity.json");
            std::fs::write(&path, serde_json::to_string_pretty(&identity)?)
                .with_context(|| format!("writing {}", path.display()))?;
            println!("Identity cached at {}", path.display());
        }
    }

    Ok(())
}
