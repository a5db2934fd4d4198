use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{RefreshReport, StoreView, VotingClient};
use ledger_rpc::{http_provider, JsonRpcLedgerClient, NodeWalletSession};
use shared::domain::{CandidateId, Identity};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;

use config::{load_settings, Settings};

#[derive(Parser, Debug)]
#[command(about = "Observe and act on an on-chain voting ledger")]
struct Args {
    #[arg(long, default_value = "ballot.toml")]
    config: PathBuf,
    /// Node-managed account to act as; defaults to the node's first account.
    #[arg(long)]
    account: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print candidates, owner, phase and, once closed, the winner.
    Status,
    /// Vote for the candidate at the given position.
    Vote { candidate: u64 },
    /// Close the round (owner only).
    Close,
}

fn warn_stale(report: &RefreshReport) {
    for failure in &report.failures {
        warn!(error = %failure, "ballot: showing stale data");
    }
}

fn print_view(settings: &Settings, view: &StoreView) {
    println!("Chain: {} ({})", settings.chain.name, settings.chain.chain_id);
    match view.session.active_identity() {
        Some(identity) => println!(
            "Connected: {identity}{}",
            if view.is_admin { " (admin)" } else { "" }
        ),
        None => println!("Connected: no"),
    }
    match &view.snapshot.owner {
        Some(owner) => println!("Owner: {owner}"),
        None => println!("Owner: unknown"),
    }
    let phase = match view.snapshot.voting_open {
        Some(true) => "open",
        Some(false) => "closed",
        None => "unknown",
    };
    println!("Voting: {phase}");
    for (index, candidate) in view.snapshot.candidates.iter().enumerate() {
        println!("  [{index}] {} - votes: {}", candidate.name, candidate.vote_count);
    }
    if let Some(winner) = &view.winner {
        println!(
            "Winner: {} with {} votes",
            winner.candidate.name, winner.candidate.vote_count
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let mut settings = load_settings(&args.config)?;
    if args.account.is_some() {
        settings.account = args.account.clone();
    }

    let provider = http_provider(&settings.chain.rpc_url)?;
    let contract_address = settings.contract_address()?;
    let ledger = JsonRpcLedgerClient::with_provider(provider.clone(), contract_address)?
        .with_confirmation(settings.confirmation());
    ledger
        .verify_chain(settings.chain.chain_id)
        .await
        .context("connected node is on the wrong chain")?;
    info!(
        rpc_url = %settings.chain.rpc_url,
        contract = %ledger.contract_address(),
        "ballot: ledger ready"
    );

    let wallet = NodeWalletSession::new(provider, settings.account.as_deref().map(Identity::new));
    let client = VotingClient::new(Arc::new(ledger), Arc::new(wallet));

    match args.command {
        Command::Status => {
            warn_stale(&client.initialize().await);
            if settings.account.is_some() {
                warn_stale(&client.connect_wallet().await?);
            }
        }
        Command::Vote { candidate } => {
            warn_stale(&client.connect_wallet().await?);
            let ack = client.vote(CandidateId(candidate)).await?;
            println!("Vote recorded in {}", ack.tx_hash);
        }
        Command::Close => {
            warn_stale(&client.connect_wallet().await?);
            let ack = client.close_voting().await?;
            println!("Voting closed in {}", ack.tx_hash);
        }
    }

    print_view(&settings, &client.view().await);
    Ok(())
}
