mod cli;
mod error;
mod extract;
mod locate;
mod plot;
mod profile;
mod retrieve;
mod variables;

use anyhow::{Error, Result};
use clap::Parser;
use cli::{command, Cli, Commands};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Profiles(args) => {
            init_logger(args.verbose);
            match command::profiles(args).await {
                Ok(files) => {
                    for file in files {
                        println!("Figure saved to `{}`", file.display());
                    }
                }
                Err(e) => {
                    eprintln!("Error: {:#}", e);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}

fn init_logger(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}
