use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use marshal_core::{PipelineBuilder, Resolution, Submission};
use marshal_protocol::PermissionPolicy;
use serde_json::Value;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "marshald")]
#[command(about = "marshal gatekeeper demo daemon")]
struct Cli {
    /// Project root the executor is confined to.
    #[arg(long, default_value = ".")]
    root: PathBuf,
    /// Permission policy as a JSON file; defaults apply when omitted.
    #[arg(long)]
    policy: Option<PathBuf>,
    /// Agent message as a JSON file, or `-` for stdin.
    #[arg(long)]
    message: PathBuf,
    /// Approve the resulting pending ticket as this actor and execute it.
    #[arg(long)]
    approve_as: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .compact()
        .init();

    let cli = Cli::parse();

    let policy = load_policy(cli.policy.as_deref()).await?;
    let raw = load_message(&cli.message).await?;

    let pipeline = PipelineBuilder::new(&cli.root).policy(policy).build();

    let ticket = match pipeline.submit(&raw).await {
        Ok(Submission::Accepted {
            message_id,
            message,
        }) => {
            info!(%message_id, kind = message.kind(), "message accepted");
            return Ok(());
        }
        Ok(Submission::PendingApproval { message_id, ticket }) => {
            info!(
                %message_id,
                approval_id = %ticket.approval_id,
                reason = %ticket.reason,
                "message gated, awaiting approval"
            );
            ticket
        }
        Err(error) => {
            warn!(%error, "message rejected");
            return Ok(());
        }
    };

    let Some(actor) = cli.approve_as else {
        info!("re-run with --approve-as <actor> to approve and execute");
        return Ok(());
    };

    match pipeline.resolve(&ticket.approval_id, true, actor).await {
        Ok(Resolution::Executed { actor, outcome }) => {
            let rendered = serde_json::to_string_pretty(&outcome)?;
            info!(%actor, "proposal executed");
            println!("{rendered}");
        }
        Ok(Resolution::Denied { actor }) => info!(%actor, "proposal denied"),
        Err(error) => warn!(%error, "execution refused"),
    }

    Ok(())
}

async fn load_policy(path: Option<&Path>) -> Result<PermissionPolicy> {
    let Some(path) = path else {
        return Ok(PermissionPolicy::default());
    };
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed reading policy file {path:?}"))?;
    serde_json::from_str(&raw).with_context(|| format!("failed parsing policy file {path:?}"))
}

async fn load_message(path: &Path) -> Result<Value> {
    let raw = if path == Path::new("-") {
        let mut buffer = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buffer)
            .await
            .context("failed reading message from stdin")?;
        buffer
    } else {
        tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed reading message file {path:?}"))?
    };
    serde_json::from_str(&raw).context("message is not valid JSON")
}
