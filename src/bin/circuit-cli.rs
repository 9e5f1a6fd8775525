use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "circuit-cli")]
#[command(about = "Inspect and control the gateway's circuit breakers", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3000")]
    url: String,

    #[arg(short, long, default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Gateway health, including every circuit
    Health,
    /// Circuit snapshots
    Circuits,
    /// Force every circuit closed
    Reset,
    /// Force one circuit open
    Open { name: String },
    /// Force one circuit closed
    Close { name: String },
    /// Zero one circuit's request counters
    ResetStats { name: String },
    /// Latency and breaker figures per service
    Services,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::builder().no_proxy().build()?;
    let base = cli.url.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let res = match cli.command {
        Commands::Health => client.get(format!("{}/health", base)).send().await?,
        Commands::Circuits => client.get(format!("{}/health/circuits", base)).send().await?,
        Commands::Reset => {
            client
                .post(format!("{}/admin/circuits/reset", base))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Open { name } => {
            client
                .post(format!("{}/admin/circuits/{}/open", base, name))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Close { name } => {
            client
                .post(format!("{}/admin/circuits/{}/close", base, name))
                .headers(headers)
                .send()
                .await?
        }
        Commands::ResetStats { name } => {
            client
                .post(format!("{}/admin/circuits/{}/stats/reset", base, name))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Services => {
            client
                .get(format!("{}/admin/services", base))
                .headers(headers)
                .send()
                .await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
