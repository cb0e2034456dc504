use anyhow::Result;
use clap::Parser;

use blobcache::cli::{run, Cli};
use blobcache::config::Config;
use blobcache_core::edit::ShellEditor;
use blobcache_core::http::HttpCacheClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing for the CLI.
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::load()?;
    // Every verb talks to the server, so the token is resolved here; parse
    // errors and --help have already exited without demanding a login.
    let client = HttpCacheClient::builder(config.host(), config.auth_token()?).build()?;
    let editor = ShellEditor::from_env();

    let result = run(cli, &client, &editor).await;
    match &result {
        Ok(_) => tracing::info!("command completed"),
        Err(e) => tracing::error!(error = %e, "command failed"),
    }
    result
}
