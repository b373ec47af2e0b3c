mod app;
mod cli;
mod dump;

use anyhow::Result;
use clap::Parser;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    mirror_logging::initialize(cli.log.destination());

    if let Some(category) = &cli.category {
        if !mojimirror_engine::is_valid_category(category) {
            anyhow::bail!(
                "unknown category {category:?}; valid categories are: {}",
                mojimirror_engine::valid_categories().join(", ")
            );
        }
    }

    if cli.dump {
        dump::run_dump(&cli).await
    } else {
        app::run_mirror(cli).await
    }
}
