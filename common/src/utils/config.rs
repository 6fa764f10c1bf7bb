use std::path::PathBuf;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Artifact locations, tried in order until one yields a valid bundle.
    #[serde(default = "default_model_paths")]
    pub model_paths: Vec<String>,
    pub search_top_k: Option<usize>,
    pub neighbor_top_k: Option<usize>,
    pub head_take: Option<usize>,
    pub max_recommendations: Option<usize>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            model_paths: default_model_paths(),
            search_top_k: None,
            neighbor_top_k: None,
            head_take: None,
            max_recommendations: None,
        }
    }
}

impl AppConfig {
    pub fn model_candidates(&self) -> Vec<PathBuf> {
        self.model_paths.iter().map(PathBuf::from).collect()
    }
}

const fn default_http_port() -> u16 {
    5000
}

fn default_model_paths() -> Vec<String> {
    vec![
        "book_recommendation_model.json".to_string(),
        "model.json".to_string(),
    ]
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    load_config("config")
}

/// Reads an optional config file (any format `config` understands, named
/// without extension) and overlays environment variables on top.
pub fn load_config(file_name: &str) -> Result<AppConfig, ConfigError> {
    load_config_with_env(file_name, Environment::default())
}

fn load_config_with_env(file_name: &str, env: Environment) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name(file_name).required(false))
        .add_source(
            env.try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("model_paths"),
        )
        .build()?;

    config.try_deserialize()
}
