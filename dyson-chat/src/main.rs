use anyhow::Result;
use clap::Parser;

use dyson_chat::cli::{execute, Cli};
use dyson_chat::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    execute(cli).await
}
