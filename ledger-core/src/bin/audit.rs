//! Ledger audit binary
//!
//! Operator entry point for the reconciliation workflow: syncs completed
//! external payments into the ledger, then sweeps every wallet and repairs
//! drift.

use ledger_core::{Config, Ledger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting ledger audit");

    let config = Config::from_env()?;
    let ledger = Ledger::open(config)?;

    let credited = ledger.sync_pending_external_payments().await?;
    let audits = ledger.reconcile_all().await?;
    let corrected = audits.iter().filter(|a| a.corrected).count();

    let stats = ledger.stats()?;
    tracing::info!(
        wallets = stats.total_wallets,
        transactions = stats.total_transactions,
        payouts = stats.total_payouts,
        payments = stats.total_payments,
        credited,
        corrected,
        "Audit complete"
    );

    if corrected > 0 {
        for audit in audits.iter().filter(|a| a.corrected) {
            tracing::warn!(
                wallet_id = %audit.wallet_id,
                stored_balance = %audit.stored_balance,
                computed_balance = %audit.computed_balance,
                "Repaired wallet"
            );
        }
    }

    Ok(())
}
