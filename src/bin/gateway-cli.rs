use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for agent-gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, env = "GATEWAY_ADMIN_KEY", default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Gateway status and liveness
    Status,
    /// Circuit breaker state per service and partition
    Breakers,
    /// Cache statistics per resource type
    Caches,
    /// Cached tenant agents
    Agents,
    /// Session lock statistics
    Sessions,
    /// Drop a tenant's cached agent so the next message rebuilds it
    Invalidate {
        /// Tenant id
        tenant: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let base = cli.url.trim_end_matches('/');
    let request = match &cli.command {
        Commands::Status => client.get(format!("{base}/admin/status")),
        Commands::Breakers => client.get(format!("{base}/admin/breakers")),
        Commands::Caches => client.get(format!("{base}/admin/caches")),
        Commands::Agents => client.get(format!("{base}/admin/agents")),
        Commands::Sessions => client.get(format!("{base}/admin/sessions")),
        Commands::Invalidate { tenant } => {
            client.post(format!("{base}/admin/agents/{tenant}/invalidate"))
        }
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if !text.is_empty() {
            eprintln!("Response: {}", text);
        }
        // 404 from invalidate still carries a JSON body worth showing.
        if status != reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}
