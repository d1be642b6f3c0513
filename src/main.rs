use clap::Parser;
use rental_client::cli::{run_payments, run_token, run_units, Cli, Command};
use rental_client::{PaymentClient, UnitClient};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let lines = match &cli.command {
        Command::Payments(command) => {
            let config = cli.client_config()?;
            debug!("Using API at {}", config.base_url());
            let client = PaymentClient::from_config(&config, cli.token_provider())?;
            run_payments(&client, command, cli.json).await?
        }
        Command::Units(command) => {
            let config = cli.client_config()?;
            debug!("Using API at {}", config.base_url());
            let client = UnitClient::from_config(&config, cli.token_provider())?;
            run_units(&client, command, cli.json).await?
        }
        Command::Token(command) => run_token(&cli.token_store(), command).await?,
    };

    for line in lines {
        println!("{}", line);
    }

    Ok(())
}
