mod app;
mod history;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// JSON run history: one run record or an array of them, oldest first.
    #[arg(long, default_value = "history.json")]
    history: PathBuf,

    /// Optional JSON layout configuration.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides the simulation seed from the configuration.
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("runviz=info")),
        )
        .init();

    let args = Args::parse();
    let mut config = history::load_config(args.config.as_deref())?;
    if let Some(seed) = args.seed {
        config.simulation.seed = seed;
    }

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size([1440.0, 920.0]),
        ..Default::default()
    };

    eframe::run_native(
        "runviz",
        options,
        Box::new(move |cc| Ok(Box::new(app::RunvizApp::new(cc, args.history, config)))),
    )
    .map_err(|error| anyhow::anyhow!("viewer failed: {error}"))
}
