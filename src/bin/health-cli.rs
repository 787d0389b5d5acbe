use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "health-cli")]
#[command(about = "Query a resource-supervisor health server", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate system health
    Health,
    /// Connection pool counters
    Pools,
    /// Lifecycle state of every supervised resource
    Resources,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let path = match cli.command {
        Commands::Health => "/health",
        Commands::Pools => "/health/db",
        Commands::Resources => "/health/resources",
    };

    let res = client
        .get(format!("{}{}", cli.url.trim_end_matches('/'), path))
        .send()
        .await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    // /health answers 503 with a full report when a subsystem fails.
    if !status.is_success() && status != reqwest::StatusCode::SERVICE_UNAVAILABLE {
        eprintln!("Error: health server returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    if !status.is_success() {
        std::process::exit(1);
    }
    Ok(())
}
