use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// Retrieval bounds used when a map request leaves a parameter out.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MapConfig {
    pub threshold: f32,
    pub k: usize,
    pub max_nodes: usize,
    pub max_edges: usize,
    pub cache_ttl_secs: u64,
    pub cache_enabled: bool,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            threshold: 0.9,
            k: 3,
            max_nodes: 200,
            max_edges: 2000,
            cache_ttl_secs: 60,
            cache_enabled: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub issuer: Option<String>,
    pub token_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "change-me".to_string(),
            issuer: None,
            token_ttl_secs: 3600,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct JobsConfig {
    pub queue_capacity: usize,
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            max_attempts: 3,
            retry_backoff_ms: 200,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IntroductionConfig {
    pub min_posts: usize,
    pub sample_size: usize,
    pub cooldown_hours: i64,
}

impl Default for IntroductionConfig {
    fn default() -> Self {
        Self {
            min_posts: 10,
            sample_size: 20,
            cooldown_hours: 24,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub map: MapConfig,
    pub auth: AuthConfig,
    pub jobs: JobsConfig,
    pub introduction: IntroductionConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new("config"))
    }

    /// Layers `default`, `{RUN_MODE}` and `POSTMAP__*` variables on top of the built-in defaults.
    pub fn load_from(dir: &Path) -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .add_source(File::from(dir.join("default")).required(false))
            .add_source(File::from(dir.join(&run_mode)).required(false))
            .add_source(Environment::with_prefix("POSTMAP").separator("__"));

        builder.build()?.try_deserialize()
    }
}
