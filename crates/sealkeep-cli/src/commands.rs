use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use tracing::{debug, info, warn};

use sealkeep_core::{
    drain, Collaborators, ErrorClass, EventFilter, Plaintext, Vault, VaultConfig, VaultEvent,
};
use sealkeep_crypto::AesGcmSealer;
use sealkeep_ledger::{InMemoryLedger, LocalWallet};
use sealkeep_store::InMemoryBlobStore;

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    match cli.command {
        Command::Demo(args) => cmd_demo(config, args, &cli.format).await,
        Command::Config => cmd_config(&config),
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<VaultConfig> {
    match &cli.config {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            VaultConfig::load(path)
                .with_context(|| format!("loading config from {}", path.display()))
        }
        None => {
            debug!("no config file given, using defaults");
            Ok(VaultConfig::default())
        }
    }
}

fn cmd_config(config: &VaultConfig) -> anyhow::Result<()> {
    print!("{}", config.to_toml_string()?);
    Ok(())
}

async fn cmd_demo(config: VaultConfig, args: DemoArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let ledger = Arc::new(InMemoryLedger::with_record_type(config.record_type.clone()));
    let wallet = Arc::new(LocalWallet::generate(ledger.clone()));
    if args.reject {
        wallet.reject_next(1);
    }
    let owner = wallet.address();
    let vault = Vault::new(
        config,
        Collaborators {
            ledger,
            wallet,
            blobs: Arc::new(InMemoryBlobStore::new()),
            sealer: Arc::new(AesGcmSealer::generate()),
        },
    )?;
    let mut events = vault.subscribe(EventFilter::default());
    info!(owner = %owner.short(), reject = args.reject, "demo vault ready");

    println!("Owner {}", owner.short().cyan());
    let secret = Plaintext::new(args.secret);
    let saved = vault.save(&args.label, &secret, args.context.as_deref()).await;
    let outcome = match saved {
        Ok(saved) => {
            println!(
                "{} Saved {} as entry {} at {}",
                "✓".green().bold(),
                saved.label.yellow(),
                saved.entry_id,
                saved.content_address.to_string().dimmed()
            );

            println!("\nEntries:");
            for entry in vault.list().await? {
                let status = if !entry.retrievable {
                    "unretrievable".red()
                } else if entry.approved {
                    "approved".green()
                } else {
                    "unapproved".yellow()
                };
                println!("  {} {} ({})", entry.secret.entry_id, entry.secret.label.bold(), status);
            }

            let got = vault.retrieve(&saved).await?;
            let matches = got.plaintext.expose() == secret.expose();
            println!(
                "\nRetrieved {}: {} (seal {})",
                saved.label.yellow(),
                if matches { "matches original".green() } else { "MISMATCH".red().bold() },
                got.metadata.seal_id.to_string().dimmed()
            );
            if let Some(context) = &got.context {
                println!("  Context: {context}");
            }
            if let Some(record) = vault.record().await? {
                let approved = vault.is_approved(&record.id()).await;
                println!("  Owner can approve record {}: {approved}", record.id().short());
            }
            Ok(())
        }
        Err(err) => {
            let hint = match err.class() {
                ErrorClass::Cancelled => "cancelled; nothing will be retried",
                ErrorClass::Conflict | ErrorClass::Transient => "retry later",
                ErrorClass::Failure => "fix and retry",
            };
            warn!(class = ?err.class(), error = %err, "demo save failed");
            println!("{} Save failed: {} ({})", "✗".red().bold(), err, hint.dimmed());
            Err(err)
        }
    };

    print_events(&drain(&mut events), format)?;
    outcome.map_err(Into::into)
}

fn print_events(events: &[VaultEvent], format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            for event in events {
                println!("{}", serde_json::to_string(event)?);
            }
        }
        OutputFormat::Text => {
            println!("\nEvents:");
            for event in events {
                let line = event.to_string();
                let line = match event.outcome {
                    sealkeep_core::Outcome::Failed { .. } => line.red(),
                    sealkeep_core::Outcome::Retrying { .. } => line.yellow(),
                    _ => line.dimmed(),
                };
                println!("  {line}");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo(reject: bool) -> DemoArgs {
        DemoArgs {
            label: "Mail".into(),
            secret: "p@ssw0rd".into(),
            context: Some("mail.example.com".into()),
            reject,
        }
    }

    #[tokio::test]
    async fn demo_runs_end_to_end() {
        cmd_demo(VaultConfig::default(), demo(false), &OutputFormat::Json)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn rejected_demo_reports_cancellation() {
        let err = cmd_demo(VaultConfig::default(), demo(true), &OutputFormat::Text)
            .await
            .unwrap_err();
        let err = err.downcast::<sealkeep_core::VaultError>().unwrap();
        assert_eq!(err.class(), ErrorClass::Cancelled);
    }

    #[test]
    fn config_prints_defaults() {
        assert!(cmd_config(&VaultConfig::default()).is_ok());
    }
}
