use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "mock-server", about = "Local stand-in for the Tillbook backend")]
struct Args {
    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,
    /// Answer 404 on current-version search endpoints.
    #[arg(long)]
    legacy_only: bool,
}

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let addr = format!("127.0.0.1:{}", args.port);
    let listener = TcpListener::bind(&addr).await?;

    let mut backend = mock_server::Backend::seeded();
    if args.legacy_only {
        backend = backend.legacy_only();
    }
    tracing::info!(legacy_only = args.legacy_only, "listening on {addr}");
    mock_server::run_with(listener, backend).await
}
