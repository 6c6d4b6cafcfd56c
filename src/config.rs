use std::path::PathBuf;

use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONTROLLER_URL: &str = "http://localhost:51121";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Default)]
pub enum ConfigLoadOption {
    #[default]
    Default,

    Path(PathBuf),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControllerConfig {
    pub url: String,
    pub token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_CONTROLLER_URL.to_string(),
            token: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Default, Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub path: Option<String>,
    pub level: Option<String>,
    #[serde(default)]
    pub append: bool,
}

#[derive(Default, Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub fn load(option: ConfigLoadOption) -> Result<Self> {
        let figment = Figment::new();

        let config = match option {
            ConfigLoadOption::Default => figment.merge(Serialized::defaults(Self::default())),
            ConfigLoadOption::Path(path) => figment
                .merge(Serialized::defaults(Self::default()))
                .merge(Yaml::file(path)),
        }
        .merge(Env::prefixed("ECN_").split("__"))
        .extract_lossy()?;

        Ok(config)
    }

    /// コマンドライン引数で指定された値で上書きする
    pub fn override_with(mut self, url: Option<String>, token: Option<String>) -> Self {
        if let Some(url) = url {
            self.controller.url = url;
        }

        if token.is_some() {
            self.controller.token = token;
        }

        self
    }
}
