use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "smsrelay")]
#[command(about = "Webhook-triggered SMS group relay", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Run the webhook server. Inbound events POST to /sms; small groups are
    /// answered with an inline reply document, large groups fan out on the
    /// worker pool.
    Serve {
        /// Config file path (default: SMSRELAY_CONFIG_PATH or ~/.smsrelay/config.yaml)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Webhook HTTP port (default from config or 8080)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Load and validate the configuration, then print a summary.
    CheckConfig {
        /// Config file path (default: SMSRELAY_CONFIG_PATH or ~/.smsrelay/config.yaml)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("smsrelay {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Serve { config, port }) => {
            if let Err(e) = run_serve(config, port).await {
                log::error!("serve failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::CheckConfig { config }) => {
            if let Err(e) = run_check_config(config) {
                log::error!("config check failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

async fn run_serve(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let (mut config, _path) = lib::config::load_config(config_path)?;
    if let Some(p) = port {
        config.server.port = p;
    }
    log::info!("starting relay on {}:{}", config.server.bind, config.server.port);
    lib::server::run_server(config).await
}

fn run_check_config(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let (config, path) = lib::config::load_config(config_path)?;
    config.validate()?;
    let routes = lib::routing::RoutingTable::from_routes(config.routes.clone())?;
    println!(
        "{}: ok ({} route(s), inline limit {}, {} worker(s))",
        path.display(),
        routes.len(),
        config.delivery.inline_limit,
        config.delivery.workers
    );
    Ok(())
}
