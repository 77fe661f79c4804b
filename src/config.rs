use async_trait::async_trait;
use dashmap::DashMap;
use inbox_channel::ReconnectPolicy;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::{env, fs, path::PathBuf, str::FromStr, time::Duration};
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

pub const API_URL: &str = "XBYTECHAT_API_URL";
pub const HUB_URL: &str = "XBYTECHAT_HUB_URL";
pub const ENVIRONMENT: &str = "XBYTECHAT_ENV";
pub const USER_ID: &str = "XBYTECHAT_USER_ID";
pub const NOTIFY_COOLDOWN_MS: &str = "XBYTECHAT_NOTIFY_COOLDOWN_MS";
pub const SEARCH_DEBOUNCE_MS: &str = "XBYTECHAT_SEARCH_DEBOUNCE_MS";
pub const STALE_RESPONSE_GUARD: &str = "XBYTECHAT_STALE_RESPONSE_GUARD";
pub const RECONNECT_MAX_ATTEMPTS: &str = "XBYTECHAT_RECONNECT_MAX_ATTEMPTS";
pub const RECONNECT_INITIAL_MS: &str = "XBYTECHAT_RECONNECT_INITIAL_MS";
pub const RECONNECT_MAX_MS: &str = "XBYTECHAT_RECONNECT_MAX_MS";
pub const REQUEST_TIMEOUT_SECS: &str = "XBYTECHAT_REQUEST_TIMEOUT_SECS";

#[async_trait::async_trait]
#[typetag::serde]
pub trait ConfigManagerType: Send + Sync {
    async fn as_vec(&self) -> Vec<(String, String)> {
        let mut config = vec![];
        for key in self.keys().await {
            if let Some(value) = self.get(&key).await {
                config.push((key, value));
            }
        }
        config
    }
    async fn keys(&self) -> Vec<String>;
    async fn get(&self, key: &str) -> Option<String>;
    async fn del(&self, key: &str);
    async fn set(&self, key: &str, value: &str) -> Result<(), String>;
    fn clone_box(&self) -> Box<dyn ConfigManagerType>;
    fn debug_box(&self) -> String;
}

#[derive(Serialize, Deserialize)]
pub struct ConfigManager(pub Box<dyn ConfigManagerType>);

impl Clone for ConfigManager {
    fn clone(&self) -> Self {
        ConfigManager(self.0.clone_box())
    }
}

impl std::fmt::Debug for ConfigManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.debug_box())
    }
}

/// Process environment, seeded from a `.env` file that `set`/`del` keep in
/// sync.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnvConfigManager {
    env_file: PathBuf,
}

impl EnvConfigManager {
    pub fn new(env_file: PathBuf) -> Box<Self> {
        if env_file.exists() {
            match dotenvy::from_path(&env_file) {
                Ok(()) => info!("Loaded .env from {}", env_file.display()),
                Err(err) => warn!("could not parse {}: {}", env_file.display(), err),
            }
        } else {
            info!("no .env at {}, using process environment", env_file.display());
        }
        Box::new(Self { env_file })
    }

    fn rewrite(&self, key: &str, value: Option<&str>) -> Result<(), String> {
        let content = fs::read_to_string(&self.env_file).unwrap_or_default();
        let mut lines: Vec<String> = Vec::new();
        let mut found = false;

        for line in content.lines() {
            match line.split_once('=') {
                Some((k, _)) if k.trim() == key => {
                    found = true;
                    if let Some(value) = value {
                        lines.push(format!("{key}={value}"));
                    }
                }
                _ => lines.push(line.to_string()),
            }
        }
        if !found {
            if let Some(value) = value {
                lines.push(format!("{key}={value}"));
            }
        }

        if let Some(parent) = self.env_file.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        fs::write(&self.env_file, lines.join("\n")).map_err(|e| e.to_string())
    }
}

#[typetag::serde]
#[async_trait]
impl ConfigManagerType for EnvConfigManager {
    async fn keys(&self) -> Vec<String> {
        env::vars().map(|(k, _)| k).collect()
    }

    async fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), String> {
        unsafe {
            env::set_var(key, value);
        };
        self.rewrite(key, Some(value))
    }

    async fn del(&self, key: &str) {
        unsafe {
            env::remove_var(key);
        };
        if let Err(err) = self.rewrite(key, None) {
            warn!("could not remove {} from {}: {}", key, self.env_file.display(), err);
        }
    }

    fn clone_box(&self) -> Box<dyn ConfigManagerType> {
        Box::new(self.clone())
    }

    fn debug_box(&self) -> String {
        "EnvConfigManager".to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MapConfigManager {
    #[schemars(with = "std::collections::HashMap<String, String>")]
    map: DashMap<String, String>,
}

impl MapConfigManager {
    pub fn new() -> Box<Self> {
        Box::new(Self {
            map: DashMap::new(),
        })
    }
}

#[typetag::serde]
#[async_trait]
impl ConfigManagerType for MapConfigManager {
    async fn keys(&self) -> Vec<String> {
        self.map.iter().map(|entry| entry.key().clone()).collect()
    }

    async fn get(&self, key: &str) -> Option<String> {
        self.map.get(key).map(|v| v.clone())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), String> {
        self.map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn del(&self, key: &str) {
        self.map.remove(key);
    }

    fn clone_box(&self) -> Box<dyn ConfigManagerType> {
        Box::new(self.clone())
    }

    fn debug_box(&self) -> String {
        format!("MapConfigManager({} entries)", self.map.len())
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("config `{key}` has invalid value `{value}`: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

/// Everything the client reads from configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub api_url: Url,
    pub hub_url: Url,
    pub environment: Environment,
    pub user_id: Option<String>,
    pub notify_cooldown: Duration,
    pub search_debounce: Duration,
    pub stale_response_guard: bool,
    pub reconnect: ReconnectPolicy,
    pub request_timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_url: Url::parse("http://localhost:7113/api/").expect("static url"),
            hub_url: Url::parse("ws://localhost:7113/chatHub").expect("static url"),
            environment: Environment::Development,
            user_id: None,
            notify_cooldown: Duration::from_millis(2500),
            search_debounce: Duration::from_millis(250),
            stale_response_guard: true,
            reconnect: ReconnectPolicy::default(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ClientSettings {
    pub async fn load(config: &ConfigManager) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let cfg = &config.0;

        let api_url = match cfg.get(API_URL).await {
            Some(raw) => parse_base_url(API_URL, &raw)?,
            None => defaults.api_url,
        };
        let hub_url = match cfg.get(HUB_URL).await {
            Some(raw) => Url::parse(&raw).map_err(|e| invalid(HUB_URL, &raw, e))?,
            None => defaults.hub_url,
        };
        let environment = match cfg.get(ENVIRONMENT).await.as_deref() {
            Some("production") | Some("prod") => Environment::Production,
            _ => Environment::Development,
        };
        let user_id = cfg.get(USER_ID).await.filter(|v| !v.trim().is_empty());

        let notify_cooldown =
            millis(cfg.get(NOTIFY_COOLDOWN_MS).await, NOTIFY_COOLDOWN_MS, defaults.notify_cooldown)?;
        let search_debounce =
            millis(cfg.get(SEARCH_DEBOUNCE_MS).await, SEARCH_DEBOUNCE_MS, defaults.search_debounce)?;
        let stale_response_guard = parsed(
            cfg.get(STALE_RESPONSE_GUARD).await,
            STALE_RESPONSE_GUARD,
            defaults.stale_response_guard,
        )?;

        let mut reconnect = defaults.reconnect;
        reconnect.max_attempts = parsed(
            cfg.get(RECONNECT_MAX_ATTEMPTS).await,
            RECONNECT_MAX_ATTEMPTS,
            reconnect.max_attempts,
        )?;
        reconnect.initial_delay = millis(
            cfg.get(RECONNECT_INITIAL_MS).await,
            RECONNECT_INITIAL_MS,
            reconnect.initial_delay,
        )?;
        reconnect.max_delay =
            millis(cfg.get(RECONNECT_MAX_MS).await, RECONNECT_MAX_MS, reconnect.max_delay)?;

        let request_timeout = Duration::from_secs(parsed(
            cfg.get(REQUEST_TIMEOUT_SECS).await,
            REQUEST_TIMEOUT_SECS,
            defaults.request_timeout.as_secs(),
        )?);

        Ok(Self {
            api_url,
            hub_url,
            environment,
            user_id,
            notify_cooldown,
            search_debounce,
            stale_response_guard,
            reconnect,
            request_timeout,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

fn invalid(key: &'static str, value: &str, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

// Joining relative paths onto a base only works when the base ends in `/`.
fn parse_base_url(key: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let mut text = raw.trim().to_string();
    if !text.ends_with('/') {
        text.push('/');
    }
    Url::parse(&text).map_err(|e| invalid(key, raw, e))
}

fn parsed<T>(raw: Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) => value.trim().parse().map_err(|e| invalid(key, &value, e)),
        None => Ok(default),
    }
}

fn millis(raw: Option<String>, key: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    let ms = parsed(raw, key, default.as_millis() as u64)?;
    Ok(Duration::from_millis(ms))
}
