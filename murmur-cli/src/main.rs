//! Murmur CLI - Command-line interface
//!
//! Runs built-in diffusion scenarios over synthetic social graphs.

mod commands;

use clap::Parser;

#[derive(Parser)]
#[command(name = "murmur")]
#[command(about = "A social-graph information diffusion simulator")]
struct Cli {
    #[command(subcommand)]
    command: commands::Commands,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    commands::handle_command(cli.command)?;

    Ok(())
}
