use crate::config::{AttainmentConfig, ConfigLoader};
use anyhow::Result;
use clap::{Args, Subcommand};

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration (merged)
    Show,
    /// Show configuration file paths
    Path,
}

pub fn run(args: ConfigArgs, config: &AttainmentConfig) -> Result<()> {
    match args.command {
        ConfigCommands::Show => show_config(config),
        ConfigCommands::Path => show_paths(),
    }
}

fn show_config(config: &AttainmentConfig) -> Result<()> {
    println!("{}", render_config(config)?);
    Ok(())
}

fn render_config(config: &AttainmentConfig) -> Result<String> {
    let mut shown = config.clone();
    if shown.database.auth_token.is_some() {
        shown.database.auth_token = Some("<redacted>".to_string());
    }
    Ok(toml::to_string_pretty(&shown)?)
}

fn show_paths() -> Result<()> {
    println!("User config:    {:?}", ConfigLoader::user_config_path());
    println!("Project config: {:?}", ConfigLoader::project_config_path());
    println!("Data directory: {:?}", attainment_paths::data_dir());
    Ok(())
}
