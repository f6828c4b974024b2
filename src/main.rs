mod cli;
mod commands;
mod ident;
mod markup;
mod model;
mod toc;
mod util;
mod workspace;

use anyhow::Result;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};

fn main() {
    init_tracing();

    if let Err(err) = run() {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::FixDepth(args) => commands::fix_depth::run(args),
        Commands::FixXrefs(args) => commands::fix_xrefs::run(args),
        Commands::FixTocTitles(args) => commands::toc_titles::run(args),
        Commands::FixTocLevels(args) => commands::toc_levels::run(args),
        Commands::GroupFrontMatter(args) => commands::front_matter::run(args),
        Commands::ReconcileIds(args) => commands::reconcile::run(args),
        Commands::FixEntities(args) => commands::entities::run(args),
        Commands::CheckIds(args) => commands::check_ids::run(args),
        Commands::Migrate(args) => commands::migrate::run(args),
        Commands::PdfText(args) => commands::pdf_text::run(args),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
