use anyhow::Context as _;
use clap::Parser as _;
use curl_mcp::config::{Cli, LogFormat};
use curl_mcp::{http, stdio};
use curl_mcp_core::{CookieJar, HttpExecutor};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("curl-mcp version {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    init_tracing(&cli.log_level, cli.log_format)?;

    // One jar per process, shared by every session on either transport.
    let executor = HttpExecutor::new(CookieJar::new()).context("build HTTP executor")?;

    if cli.http {
        let config = cli.http_config()?;
        let shutdown = CancellationToken::new();
        tokio::spawn(http::cancel_on_signal(shutdown.clone()));
        http::serve_http(config, executor, shutdown).await?;
    } else {
        stdio::serve_stdio(executor).await?;
    }

    Ok(())
}

// stdout is reserved for protocol frames on the stdio transport.
fn init_tracing(level: &str, format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(level).with_context(|| format!("invalid log filter '{level}'"))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    match format {
        LogFormat::Text => builder.with_ansi(false).try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|e| anyhow::anyhow!("init tracing: {e}"))
}
