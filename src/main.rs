mod cli;
mod error;
mod index;
mod loader;
mod modfile;
mod modpath;
mod resolve;
mod rewrite;
mod version;
mod workflow;

use clap::Parser;
use cli::{Cli, Config};
use colored::Colorize;
use std::process;

fn main() {
    let cli = Cli::parse();
    let config = Config::from_cli(&cli);

    let result = workflow::execute(&config, cli.module.as_deref(), cli.version.as_deref());

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        process::exit(1);
    }
}
