use anyhow::Result;
use clap::{Parser, Subcommand};
use meetspace_config::{AppConfig, ConfigLoader};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "meetspace",
    version,
    about = "MeetSpace - streaming chat relay"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Directory holding config.yml / config.toml
    #[arg(long, global = true, env = "MEETSPACE_CONFIG_DIR")]
    config_dir: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server
    Start {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,
    },

    /// Show the status of a running gateway
    Status,

    /// Write a starter config file
    Init,
}

fn init_tracing(cli_level: Option<&str>, config: &AppConfig) {
    let level = cli_level
        .or(config.log_level.as_deref())
        .unwrap_or("info");

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();
}

fn config_source(loader: &ConfigLoader) -> String {
    match loader.config_file() {
        Some(path) => format!("loaded config from {}", path.display()),
        None => format!(
            "no config file in {}, using defaults",
            loader.config_dir().display()
        ),
    }
}

/// Address a local client should use to reach the configured bind address.
fn client_host(bind_host: &str) -> &str {
    match bind_host {
        "0.0.0.0" | "::" | "[::]" => "127.0.0.1",
        other => other,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config_loader = match &cli.config_dir {
        Some(dir) => ConfigLoader::with_dir(dir),
        None => ConfigLoader::new()?,
    };
    // Config picks the log filter; its source is reported once tracing is up.
    let config = config_loader.load()?;
    init_tracing(cli.log_level.as_deref(), &config);
    info!("MeetSpace v{}", env!("CARGO_PKG_VERSION"));
    info!("{}", config_source(&config_loader));

    match cli.command {
        Commands::Start { host, port } => {
            let mut config = config;
            if let Some(host) = host {
                config.gateway.host = host;
            }
            if let Some(port) = port {
                config.gateway.port = port;
            }

            let server = meetspace_gateway::GatewayServer::new(config);
            server.run().await?;
        }
        Commands::Status => {
            println!("MeetSpace status: checking gateway...");
            let url = format!(
                "http://{}:{}/api/status",
                client_host(&config.gateway.host),
                config.gateway.port
            );

            let resp = reqwest::Client::new().get(&url).send().await.map_err(|_| {
                anyhow::anyhow!(
                    "Gateway is not running at {}:{}",
                    config.gateway.host,
                    config.gateway.port
                )
            })?;

            let body = resp.json::<serde_json::Value>().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Commands::Init => {
            let dir = config_loader.config_dir().display();
            if config_loader.init()? {
                println!("Wrote {dir}/config.yml");
                println!("Set GROQ_API_KEY (or llm.api_key) and run `meetspace start`.");
            } else {
                println!("Config already present in {dir}, leaving it untouched.");
            }
        }
    }

    Ok(())
}
