use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "notefold", about = "Clusters text notes into topic folders")]
pub struct Cli {
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone)]
pub struct ConfigArg {
    #[arg(long, default_value = "notefold.yaml")]
    pub config: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a batch every poll interval until Ctrl-C.
    Serve(ConfigArg),
    /// Run a single batch and print the report as JSON.
    Once(ConfigArg),
    /// Print the grouping a batch would produce without moving anything.
    Plan(ConfigArg),
    /// Print the effective settings as YAML.
    Config(ConfigArg),
}

impl Command {
    pub fn config_path(&self) -> &PathBuf {
        match self {
            Command::Serve(arg) | Command::Once(arg) | Command::Plan(arg) | Command::Config(arg) => {
                &arg.config
            }
        }
    }
}
