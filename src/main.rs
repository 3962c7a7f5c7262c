use clap::Parser;
use impala_backend::Config;
use tracing::{error, info};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&config.logging.level)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Dry run against {}", config.database.masked());

    match args.command.run(&config).await {
        Ok(statements) => {
            for sql in statements {
                println!("{};", sql);
            }
            Ok(())
        }
        Err(e) => match cli::exit_code(&e) {
            Some(code) => {
                error!("{:#}", e);
                std::process::exit(code);
            }
            None => Err(e),
        },
    }
}
