//! Configuration loader and validator for the stock checker.
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

pub const ENV_TABLE_NAME: &str = "STORAGE_TABLE_NAME";
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_DESTINATION_ID: &str = "NOTIFY_DESTINATION_ID";
pub const ENV_CREDENTIAL: &str = "NOTIFY_CREDENTIAL";

static IDENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex"));

/// Root configuration struct mirroring the YAML schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub app: App,
    pub catalog: Catalog,
    pub notify: Notify,
}

/// Storage and runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct App {
    pub database_url: String,
    pub table_name: String,
    pub request_timeout_secs: u64,
}

/// The one catalog page being watched and how its listings are marked up.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Catalog {
    pub url: String,
    pub allowed_domain: String,
    pub product_class: String,
    pub title_link_class: String,
    pub out_of_stock_class: String,
}

/// Messaging endpoint. Destination and credential stay optional here; the
/// notifier refuses to send without them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Notify {
    pub api_base: String,
    pub destination_id: Option<String>,
    pub credential: Option<String>,
}

impl Default for App {
    fn default() -> Self {
        Self {
            database_url: "sqlite://./data/stockbot.db".into(),
            table_name: "notification_state".into(),
            request_timeout_secs: 30,
        }
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            url: "https://www.marukyu-koyamaen.co.jp/english/shop/products/catalog/matcha/principal"
                .into(),
            allowed_domain: "www.marukyu-koyamaen.co.jp".into(),
            product_class: "product".into(),
            title_link_class: "woocommerce-loop-product__link".into(),
            out_of_stock_class: "outofstock".into(),
        }
    }
}

impl Default for Notify {
    fn default() -> Self {
        Self {
            api_base: "https://api.telegram.org/".into(),
            destination_id: None,
            credential: None,
        }
    }
}

impl Config {
    /// Overlay values from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Overlay values from an arbitrary lookup. Empty values count as unset.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(v) = get(ENV_TABLE_NAME) {
            self.app.table_name = v;
        }
        if let Some(v) = get(ENV_DATABASE_URL) {
            self.app.database_url = v;
        }
        if let Some(v) = get(ENV_DESTINATION_ID) {
            self.notify.destination_id = Some(v);
        }
        if let Some(v) = get(ENV_CREDENTIAL) {
            self.notify.credential = Some(v);
        }
    }
}

/// Load configuration from an optional YAML file, overlay the environment and
/// validate. Without a file the built-in defaults apply.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut cfg = match path {
        Some(p) => {
            let content = fs::read_to_string(p)?;
            serde_yaml::from_str(&content)?
        }
        None => Config::default(),
    };
    cfg.apply_env();
    validate(&cfg)?;
    Ok(cfg)
}

pub fn is_valid_table_name(name: &str) -> bool {
    IDENT_RE.is_match(name)
}

/// Validate a configuration instance.
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.database_url.trim().is_empty() {
        return Err(ConfigError::Invalid("app.database_url must be non-empty"));
    }
    if !is_valid_table_name(&cfg.app.table_name) {
        return Err(ConfigError::Invalid(
            "app.table_name must be a plain identifier ([A-Za-z_][A-Za-z0-9_]*)",
        ));
    }
    if cfg.app.request_timeout_secs == 0 {
        return Err(ConfigError::Invalid("app.request_timeout_secs must be > 0"));
    }

    if cfg.catalog.url.trim().is_empty() {
        return Err(ConfigError::Invalid("catalog.url must be non-empty"));
    }
    if cfg.catalog.allowed_domain.trim().is_empty() {
        return Err(ConfigError::Invalid("catalog.allowed_domain must be non-empty"));
    }
    if cfg.catalog.product_class.trim().is_empty() {
        return Err(ConfigError::Invalid("catalog.product_class must be non-empty"));
    }
    if cfg.catalog.out_of_stock_class.trim().is_empty() {
        return Err(ConfigError::Invalid("catalog.out_of_stock_class must be non-empty"));
    }

    if cfg.notify.api_base.trim().is_empty() {
        return Err(ConfigError::Invalid("notify.api_base must be non-empty"));
    }

    Ok(())
}

/// Example YAML matching the defaults, with placeholders for secrets.
pub fn example() -> &'static str {
    r#"app:
  database_url: "sqlite://./data/stockbot.db"
  table_name: "notification_state"
  request_timeout_secs: 30

catalog:
  url: "https://www.marukyu-koyamaen.co.jp/english/shop/products/catalog/matcha/principal"
  allowed_domain: "www.marukyu-koyamaen.co.jp"
  product_class: "product"
  title_link_class: "woocommerce-loop-product__link"
  out_of_stock_class: "outofstock"

notify:
  api_base: "https://api.telegram.org/"
  destination_id: "YOUR_CHAT_ID"
  credential: "YOUR_BOT_TOKEN"
"#
}
