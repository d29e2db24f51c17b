use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "worker-cli")]
#[command(about = "Management CLI for the background worker daemon", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    /// Admin API key, if one is configured
    #[arg(short, long)]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregated worker health
    Status,
    /// Audit queue and flush counters
    Audit,
    /// Latest service health evaluation
    Services,
    /// Call statistics for one service
    Service { name: String },
    /// Run a cleanup sweep now
    Cleanup,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if let Some(key) = &cli.key {
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", key))?,
        );
    }

    let request = match &cli.command {
        Commands::Status => client.get(format!("{}/health", cli.url)),
        Commands::Audit => client.get(format!("{}/health/audit", cli.url)),
        Commands::Services => client.get(format!("{}/health/services", cli.url)),
        Commands::Service { name } => client.get(format!("{}/services/{}", cli.url, name)),
        Commands::Cleanup => client.post(format!("{}/cleanup", cli.url)),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await?;
    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
