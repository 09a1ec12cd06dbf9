//! posql_client CLI
//!
//! Command-line interface for running and verifying SQL queries, planning
//! them, deriving commitment storage keys and inspecting attestations.

use anyhow::Result;
use clap::Parser;
use posql_client::cli::{self, Cli, Environment, VerifierFactory};
use posql_client::transport::{CancellationSignal, ReqwestTransport};
use posql_client::utils::Logger;
use std::sync::Arc;

#[cfg(feature = "transcript-adapter")]
fn transcript_verifier(
    scheme: posql_client::CommitmentScheme,
) -> Arc<dyn posql_client::PlanVerifyAdapter> {
    Arc::new(posql_client::adapter::TranscriptAdapter::new(scheme))
}

#[cfg(feature = "transcript-adapter")]
fn verifier() -> Option<VerifierFactory> {
    log::warn!("using the transcript test double: results are NOT cryptographically verified");
    Some(transcript_verifier)
}

#[cfg(not(feature = "transcript-adapter"))]
fn verifier() -> Option<VerifierFactory> {
    None
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    Logger::init_with_level(Logger::level_for_verbosity(cli.verbose));

    let (handle, signal) = CancellationSignal::new();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("interrupt received, canceling");
            handle.cancel();
        }
    });

    let env = Environment {
        transport: Arc::new(ReqwestTransport::new()),
        verifier: verifier(),
        cancel: Some(signal),
    };
    cli::execute(cli.command, &env, &mut std::io::stdout()).await
}
