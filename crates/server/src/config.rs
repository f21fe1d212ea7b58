use config::ConfigError;
use serde::Deserialize;
use std::collections::HashMap;

pub const DEFAULT_SESSION_SECRET: &str = "change_me_please";

#[derive(Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub security: SecuritySettings,
}

#[derive(Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub cors_origins: String,
}

#[derive(Deserialize, Clone)]
pub struct DatabaseSettings {
    pub url: String,
}

#[derive(Deserialize, Clone)]
pub struct SecuritySettings {
    /// HMAC key for bearer session tokens.
    pub session_secret: String,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());
        let env_map = collect_env_vars();
        let env_json = serde_json::to_string(&env_map)
            .map_err(|e| ConfigError::Message(format!("Failed to encode environment: {}", e)))?;

        let s = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("server.cors_origins", "*")?
            .set_default("database.url", "sqlite://data/inkwell.db")?
            .set_default("security.session_secret", DEFAULT_SESSION_SECRET)?
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::File::with_name(&format!("config.{}", run_mode)).required(false))
            .add_source(config::File::from_str(&env_json, config::FileFormat::Json))
            .build()?;

        s.try_deserialize()
    }
}

// INKWELL_SERVER__PORT=8080 -> server.port
fn collect_env_vars() -> HashMap<String, String> {
    collect_prefixed(std::env::vars())
}

fn collect_prefixed(vars: impl Iterator<Item = (String, String)>) -> HashMap<String, String> {
    vars.filter(|(k, _)| k.starts_with("INKWELL_"))
        .map(|(k, v)| {
            let new_key = k
                .trim_start_matches("INKWELL_")
                .replace("__", ".")
                .to_lowercase();
            (new_key, v)
        })
        .collect()
}
