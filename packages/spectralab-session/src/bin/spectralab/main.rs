use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use spectralab_session::{AnalyzerSession, Preset, RuntimeConfig};

#[derive(Parser)]
#[command(
    name = "spectralab",
    version,
    about = "Wideband signal analyzer session runner",
    long_about = "Runs an analyzer session against the local simulator or a WebSocket bridge.\n\
                  Set ANALYZER_BRIDGE_URL (or pass --bridge-url) to mirror a live bridge."
)]
struct Cli {
    /// WebSocket bridge URL; simulator mode when omitted
    #[arg(long, env = "ANALYZER_BRIDGE_URL")]
    bridge_url: Option<String>,

    /// Recall a preset before arming (5g-fr2, satcom, radar)
    #[arg(long)]
    preset: Option<String>,

    /// Seconds to keep the capture loop running
    #[arg(long, default_value_t = 10)]
    duration_secs: u64,

    /// Compact JSON output (no indentation)
    #[arg(long, default_value_t = false)]
    compact: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "spectralab_session=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut runtime = RuntimeConfig::from_env();
    if cli.bridge_url.is_some() {
        runtime.bridge_url = cli.bridge_url;
    }
    let connect_delay = runtime.connect_delay;

    let session = AnalyzerSession::new(runtime);
    session.connect();
    tokio::time::sleep(connect_delay + Duration::from_millis(200)).await;

    if let Some(preset) = cli.preset.as_deref() {
        let preset: Preset = preset.parse()?;
        session.recall_preset(preset);
    }

    session.toggle_acquisition();
    info!("capturing for {}s", cli.duration_secs);
    tokio::time::sleep(Duration::from_secs(cli.duration_secs)).await;
    session.toggle_acquisition();
    session.disconnect();

    let snapshot = session.snapshot();
    let json = if cli.compact {
        serde_json::to_string(&snapshot)?
    } else {
        serde_json::to_string_pretty(&snapshot)?
    };
    println!("{json}");

    Ok(())
}
