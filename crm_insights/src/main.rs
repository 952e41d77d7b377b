use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use crm_insights::{
    QueryContext,
    backend::HttpBackend,
    cli::{
        Cli, Commands, StdinGate,
        commands::FilterArgs,
        params::{build_filter, period_filter},
        report::{activity_report, deals_report, user_report},
    },
    config::{ClientConfig, load_config_path, token_from_env},
    models::{filter::QueryFilter, retrieval::StatsKind, user::UserId},
    orchestrator::{AutoConfirm, ConfirmationGate, OrchestratorSettings, TieredRetrievalOrchestrator},
    session::{FileTokenStore, MemoryTokenStore, TokenStore},
};
use serde::Serialize;
use tracing::warn;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("crm_insights=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<ClientConfig> {
    match &cli.config {
        Some(path) => load_config_path(path).with_context(|| format!("loading {}", path.display())),
        None => {
            let mut config = ClientConfig::default();
            config.apply_env_overrides();
            config.validate()?;
            Ok(config)
        }
    }
}

/// `CRM_INSIGHTS_TOKEN` wins over the token file and is never written to it.
fn token_store(config: &ClientConfig) -> Result<Arc<dyn TokenStore>> {
    if let Some(token) = token_from_env() {
        let store = MemoryTokenStore::new();
        store.set(token)?;
        return Ok(Arc::new(store));
    }
    match &config.token_store {
        Some(path) => {
            let store = FileTokenStore::open(path).with_context(|| format!("opening token store {}", path.display()))?;
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(MemoryTokenStore::new())),
    }
}

fn gate(filter: &FilterArgs) -> Arc<dyn ConfirmationGate> {
    if filter.yes {
        Arc::new(AutoConfirm(true))
    } else {
        Arc::new(StdinGate)
    }
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let tokens = token_store(&config)?;
    let ctx = QueryContext::new(config.tz()?, Arc::clone(&tokens));
    let backend = HttpBackend::new(&config.base_url, tokens)?;
    let orchestrator = TieredRetrievalOrchestrator::new(backend, OrchestratorSettings::from(&config));

    // best effort; unknown users render as "ID: <id>"
    if let Err(err) = orchestrator.load_directory(&ctx).await {
        warn!(error = %err, "Could not load user names");
    }

    match cli.command {
        Commands::Activity { filter: args, stats } => {
            let filter = build_filter(&args)?;
            let orchestrator = orchestrator.with_gate(gate(&args));
            let result = orchestrator.fetch_statistics(&ctx, &filter, StatsKind::Activity).await;
            let report = activity_report(&result, &ctx, &filter, stats, args.compare);
            print_json(&report)?;
            if let Some(err) = result.error() {
                bail!("activity retrieval failed: {err}");
            }
        }

        Commands::Deals { filter: args } => {
            let filter = build_filter(&args)?;
            let orchestrator = orchestrator.with_gate(gate(&args));
            let result = orchestrator.fetch_statistics(&ctx, &filter, StatsKind::Deals).await;
            let report = deals_report(&result, &ctx, args.compare);
            print_json(&report)?;
            if let Some(err) = result.error() {
                bail!("deals retrieval failed: {err}");
            }
        }

        Commands::User { id, period } => {
            let filter: QueryFilter = period_filter(&period)?;
            let user_id = UserId::from(id.trim());
            let days = orchestrator.fetch_user_activities(&ctx, &user_id, &filter).await?;
            print_json(&user_report(user_id, &ctx, days))?;
        }
    }

    Ok(())
}
