use anyhow::Result;
use clap::Parser;
use indoc::indoc;
use std::path::PathBuf;

use crate::config::ConfigLoadOption;

use super::SubCommand;

const AFTER_HELP: &str = indoc! {"
    Examples:
      ecn-deploy apply application.yaml
      ecn-deploy -u https://controller.example.com:51121 -t $TOKEN apply nats.yaml rbac.yaml
      ecn-deploy validate resources.yaml
"};

#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about,
    long_about = None,
    disable_help_subcommand = true,
    after_help = AFTER_HELP
)]
pub struct Command {
    /// Controller API URL
    #[arg(
        short = 'u',
        long,
        value_name = "URL",
        env = "ECN_CONTROLLER_URL",
        global = true,
        display_order = 1000
    )]
    pub controller_url: Option<String>,

    /// Bearer token for the controller API
    #[arg(
        short,
        long,
        env = "ECN_TOKEN",
        hide_env_values = true,
        global = true,
        display_order = 1000
    )]
    pub token: Option<String>,

    /// Logging
    #[arg(short = 'l', long, global = true, display_order = 1000)]
    pub logging: bool,

    /// Config file path
    #[arg(long, global = true, display_order = 1000)]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub subcommand: SubCommand,
}

impl Command {
    pub fn init() -> Self {
        Self::parse()
    }

    pub fn config_load_option(&self) -> Result<ConfigLoadOption> {
        let option = if let Some(path) = &self.config_file {
            match path.try_exists() {
                Ok(true) => ConfigLoadOption::Path(path.clone()),
                Ok(false) => {
                    eprintln!("Config file not found: {:?}", path);

                    ConfigLoadOption::Default
                }
                Err(err) => {
                    eprintln!("Failed to check config file exists: {}", err);

                    ConfigLoadOption::Default
                }
            }
        } else {
            match xdg_config_home().map(|dir| dir.join("config.yaml")) {
                Some(path) => match path.try_exists() {
                    Ok(true) => ConfigLoadOption::Path(path),
                    Ok(false) => ConfigLoadOption::Default,
                    Err(err) => {
                        eprintln!("Failed to check config file exists: {}", err);

                        ConfigLoadOption::Default
                    }
                },
                None => ConfigLoadOption::Default,
            }
        };

        Ok(option)
    }
}

fn xdg_config_home() -> Option<PathBuf> {
    match std::env::var_os("XDG_CONFIG_HOME").map(|s| PathBuf::from(s).join("ecn-deploy")) {
        Some(path) => Some(path),
        None => dirs::home_dir().map(|home| home.join(".config").join("ecn-deploy")),
    }
}
