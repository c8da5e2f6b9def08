mod app;
mod collab;
mod util;

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::collab::DataSource;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// JSON array of collaboration records.
    #[arg(long, default_value = "collaborations.json")]
    records: PathBuf,

    /// Country code to name map. Defaults to `country_codes.json` next to the records.
    #[arg(long)]
    country_codes: Option<PathBuf>,

    /// Optional author directory with `authors` and `collaborations` arrays.
    #[arg(long)]
    authors: Option<PathBuf>,
}

fn main() -> eframe::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let source = DataSource::new(args.records, args.country_codes).with_authors(args.authors);
    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size([1440.0, 920.0]),
        ..Default::default()
    };

    eframe::run_native(
        "collab-atlas",
        options,
        Box::new(move |cc| Ok(Box::new(app::DashboardApp::new(cc, source)))),
    )
}
