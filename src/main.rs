use std::error::Error;
use std::path::PathBuf;

use fix_oracle::{HttpOracle, OracleConfig};
use patch_engine::{EngineConfig, load_findings, remediate};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // A missing .env is fine; variables may come from the environment.
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info,patch_engine=info"))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();

    let manifest = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("FINDINGS_MANIFEST").ok())
        .map(PathBuf::from)
        .ok_or("usage: autofix-backend <findings.json> (or set FINDINGS_MANIFEST)")?;

    let cfg = EngineConfig::from_env()?;
    let oracle = HttpOracle::from_config(OracleConfig::from_env()?)?;
    info!(
        manifest = %manifest.display(),
        repo_root = %cfg.repo_root.display(),
        model = oracle.model(),
        "autofix starting"
    );

    let findings = load_findings(&manifest).await?;
    let print_report = cfg.report_path.is_none();
    let report = remediate(cfg, oracle, &findings).await?;

    if print_report {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}
