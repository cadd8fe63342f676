//! Pingback - OOB Interaction Catcher CLI

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use pingback::config;
use pingback::models::{SeedMode, ServerConfig};
use pingback::oob::OobServer;

/// Pingback - Out-of-Band Interaction Catcher
#[derive(Parser)]
#[command(name = "pingback", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the callback server
    Serve {
        /// Interface to bind
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Externally reachable base URL (used when printing endpoints)
        #[arg(long)]
        public_url: Option<String>,

        /// Demo data seeding (startup, on_read, off)
        #[arg(long)]
        seed_demo: Option<SeedMode>,

        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Print the callback URLs for a server
    Endpoints {
        /// Externally reachable base URL
        #[arg(long)]
        public_url: Option<String>,

        /// Domain to embed in the sample DNS callback
        #[arg(long, default_value = "exfil.example.test")]
        domain: String,

        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose { "pingback=debug" } else { "pingback=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();
}

fn load_base_config(path: Option<&Path>) -> pingback::error::Result<ServerConfig> {
    if let Some(path) = path {
        return config::load_config(path);
    }
    let default_path = Path::new("config/pingback.toml");
    if default_path.exists() {
        config::load_config(default_path)
    } else {
        Ok(ServerConfig::default())
    }
}

fn print_banner() {
    let banner = r#"
    ╔═══════════════════════════════════════╗
    ║  PINGBACK v0.1.0                      ║
    ║  Out-of-Band Interaction Catcher      ║
    ╚═══════════════════════════════════════╝
    "#;
    println!("{}", banner.cyan());
}

fn print_endpoints(server: &OobServer, domain: &str) {
    println!("  {}", "Callback Endpoints".bold());
    println!("  {}", "─".repeat(35));
    println!("    {:14} {}", "HTTP".cyan().bold(), server.callback_url().green());
    println!(
        "    {:14} {}",
        "DNS (A)".cyan().bold(),
        server.dns_callback_url(domain, "A").green()
    );
    println!(
        "    {:14} {}",
        "DNS (TXT)".cyan().bold(),
        server.dns_callback_url(domain, "TXT").green()
    );
    println!("    {:14} {}", "Log".cyan().bold(), server.requests_url().green());
    println!();
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            host,
            port,
            public_url,
            seed_demo,
            config: config_path,
            verbose,
        } => {
            init_logging(verbose);
            print_banner();

            let mut server_config = load_base_config(config_path.as_deref())?;
            config::merge_cli_args(&mut server_config, host, port, public_url, seed_demo)?;

            println!("  {} {}", "Listening:".bold(), server_config.bind_addr().green());
            println!(
                "  {} {}\n",
                "Demo seed:".bold(),
                format!("{:?}", server_config.seed_mode).cyan()
            );

            let server = OobServer::new(server_config);
            print_endpoints(&server, "exfil.example.test");
            println!("  {}\n", "Press Ctrl+C to stop.".yellow());

            tokio::select! {
                result = server.run() => {
                    if let Err(ref e) = result {
                        error!("Server stopped: {}", e);
                    }
                    result?;
                }
                signal = tokio::signal::ctrl_c() => {
                    if let Err(e) = signal {
                        error!("Failed to listen for ctrl+c: {}", e);
                    }
                    info!(
                        "Shutting down, {} interactions were held in memory",
                        server.store().len()
                    );
                }
            }
        }

        Commands::Endpoints {
            public_url,
            domain,
            config: config_path,
        } => {
            let mut server_config = load_base_config(config_path.as_deref())?;
            config::merge_cli_args(&mut server_config, None, None, public_url, None)?;

            print_banner();
            print_endpoints(&OobServer::new(server_config), &domain);
        }
    }

    Ok(())
}
