// prism - journals to atoms, groups and synthesis
// Main entry point

use clap::Parser;
use tracing_subscriber::EnvFilter;

use knowledge_prism::cli::{run, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins; --verbose raises the default to debug
    let default_level = if cli.verbose() { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("fatal: {e:#}");
        std::process::exit(1);
    }
}
