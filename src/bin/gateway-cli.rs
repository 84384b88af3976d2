use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for the leave-policy gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Admin API key, sent as a bearer token.
    #[arg(short, long, env = "GATEWAY_ADMIN_API_KEY")]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check gateway and warehouse health
    Health,
    /// Show warehouse client and breaker stats
    Stats,
    /// List circuit breakers
    Breakers,
    /// Force a circuit breaker closed
    Reset {
        /// Breaker name, e.g. warehouse_client
        name: String,
    },
    /// Look up one employee
    Employee {
        id: String,
    },
    /// List employees, optionally filtered
    Employees {
        #[arg(long)]
        country: Option<String>,
        #[arg(long)]
        department: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    if let Some(key) = &cli.key {
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", key))?,
        );
    }

    let request = match cli.command {
        Commands::Health => client.get(format!("{}/health", base)),
        Commands::Stats => client.get(format!("{}/stats", base)),
        Commands::Breakers => client
            .get(format!("{}/admin/breakers", base))
            .headers(headers),
        Commands::Reset { name } => client
            .post(format!("{}/admin/breakers/{}/reset", base, name))
            .headers(headers),
        Commands::Employee { id } => client.get(format!("{}/employees/{}", base, id)),
        Commands::Employees {
            country,
            department,
        } => {
            let mut query = Vec::new();
            if let Some(country) = country {
                query.push(("country", country));
            }
            if let Some(department) = department {
                query.push(("department", department));
            }
            client.get(format!("{}/employees", base)).query(&query)
        }
    };

    print_response(request.send().await?).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
