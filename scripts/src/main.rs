use clap::Parser;
use deploy_scripts::cli::Cli;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // A missing `.env` file is not an error, the environment may be set directly
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::fmt().pretty().init();

    cli.run().await?;
    Ok(())
}
