use std::path::PathBuf;

use clap::Parser;

use vorsorge::api::{ServerConfig, run_http_server};

#[derive(Parser, Debug)]
#[command(
    name = "vorsorge",
    about = "Funding-advantage estimator and lead capture service for German retirement products"
)]
struct Cli {
    /// Port the HTTP server binds to.
    #[arg(long, default_value_t = 3001)]
    port: u16,
    /// Directory holding leads.json and users.json.
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,
    /// Default log filter when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = vorsorge::telemetry::init(&cli.log_level) {
        eprintln!("Telemetry error: {e}");
        std::process::exit(1);
    }

    let config = ServerConfig {
        port: cli.port,
        data_dir: cli.data_dir,
    };
    if let Err(e) = run_http_server(config).await {
        eprintln!("Server error: {e}");
        std::process::exit(1);
    }
}
