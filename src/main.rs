use anyhow::Result;
use clap::Parser;
use foodchat::cli::CliArgs;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    foodchat::run(args).await
}
