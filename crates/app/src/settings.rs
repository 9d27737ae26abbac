//! Settings for the sync binary.
//!
//! Sources, lowest priority first: built-in defaults, the TOML file
//! (`config/inter_sync.toml` unless `--config` says otherwise), the plain
//! variable names of older `.env` files (see [`LEGACY_KEYS`]),
//! `INTER_SYNC__*` environment variables (a `.env` file is loaded into the
//! environment first) and finally the command line flags.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use clap::Parser;
use engine::{
    DEFAULT_WINDOW_DAYS, EntityReference, EntityReferenceTable, EntityTag, default_floor_date,
};
use serde::Deserialize;

use crate::error::{AppError, Result};

const DEFAULT_CONFIG_PATH: &str = "config/inter_sync";
const ENV_PREFIX: &str = "INTER_SYNC";
const DEFAULT_UNIQUE_FIELD: &str = "Identificador";

#[derive(Debug, Parser)]
#[command(name = "inter_sync", about = "Sync the bank statement into the finance database")]
struct Args {
    /// Optional config file path (TOML).
    #[arg(long)]
    config: Option<String>,
    /// First day to fetch (YYYY-MM-DD). Never earlier than the floor date.
    #[arg(long)]
    since: Option<NaiveDate>,
    /// Override log level (e.g. debug).
    #[arg(long)]
    level: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct App {
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Bank {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub cert_path: String,
    pub key_path: String,
    pub scope: String,
}

impl Default for Bank {
    fn default() -> Self {
        Self {
            base_url: clients::inter::DEFAULT_BASE_URL.to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            cert_path: String::new(),
            key_path: String::new(),
            scope: clients::inter::DEFAULT_SCOPE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Notion {
    pub base_url: String,
    pub token: String,
    /// Database new transaction records are created in.
    pub database_id: String,
    pub version: String,
}

impl Default for Notion {
    fn default() -> Self {
        Self {
            base_url: clients::notion::DEFAULT_BASE_URL.to_string(),
            token: String::new(),
            database_id: String::new(),
            version: clients::notion::DEFAULT_VERSION.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Window {
    pub floor_date: NaiveDate,
    pub window_days: u32,
    pub since: Option<NaiveDate>,
}

impl Default for Window {
    fn default() -> Self {
        Self {
            floor_date: default_floor_date(),
            window_days: DEFAULT_WINDOW_DAYS,
            since: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub app: App,
    pub bank: Bank,
    pub notion: Notion,
    pub sync: Window,
    /// Per-tag overrides; blank fields fall back to the built-in columns.
    pub entities: BTreeMap<EntityTag, EntityReference>,
}

impl Settings {
    /// Entity table with configured values laid over the defaults.
    pub fn entity_table(&self) -> EntityReferenceTable {
        let mut table = default_entities();
        for (tag, configured) in &self.entities {
            let entry = table.entry(*tag).or_default();
            if !configured.database_id.trim().is_empty() {
                entry.database_id = configured.database_id.clone();
            }
            if !configured.column.trim().is_empty() {
                entry.column = configured.column.clone();
            }
            if !configured.unique_field.trim().is_empty() {
                entry.unique_field = configured.unique_field.clone();
            }
        }
        EntityReferenceTable::from(table)
    }

    /// Reject settings the clients cannot start with.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("bank.client_id", &self.bank.client_id),
            ("bank.client_secret", &self.bank.client_secret),
            ("bank.cert_path", &self.bank.cert_path),
            ("bank.key_path", &self.bank.key_path),
            ("notion.token", &self.notion.token),
            ("notion.database_id", &self.notion.database_id),
        ];
        let missing: Vec<&str> = required
            .into_iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(key, _)| key)
            .collect();

        if !missing.is_empty() {
            return Err(AppError::Settings(format!(
                "missing required settings: {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }
}

fn default_entities() -> BTreeMap<EntityTag, EntityReference> {
    BTreeMap::from([
        (
            EntityTag::Obra,
            EntityReference::new("", "Controle Financeiro", DEFAULT_UNIQUE_FIELD),
        ),
        (
            EntityTag::Elevare,
            EntityReference::new("", "Pagar e Receber", DEFAULT_UNIQUE_FIELD),
        ),
    ])
}

/// Unprefixed variables of older deployments and the key each one sets.
pub const LEGACY_KEYS: [(&str, &str); 8] = [
    ("CLIENT_ID", "bank.client_id"),
    ("CLIENT_SECRET", "bank.client_secret"),
    ("INTER_CERT_PATH", "bank.cert_path"),
    ("INTER_KEY_PATH", "bank.key_path"),
    ("NOTION_TOKEN", "notion.token"),
    ("NOTION_DATABASE", "notion.database_id"),
    ("CONTROLE_FINANCEIRO", "entities.OBRA.database_id"),
    ("PAGAR_E_RECEBER", "entities.ELEVARE.database_id"),
];

/// Config source reading [`LEGACY_KEYS`] from the process environment, or
/// from a fixed map.
#[derive(Clone, Debug, Default)]
struct LegacyEnv {
    vars: Option<HashMap<String, String>>,
}

impl LegacyEnv {
    fn lookup(&self, name: &str) -> Option<String> {
        match &self.vars {
            Some(vars) => vars.get(name).cloned(),
            None => std::env::var(name).ok(),
        }
    }
}

impl config::Source for LegacyEnv {
    fn clone_into_box(&self) -> Box<dyn config::Source + Send + Sync> {
        Box::new(self.clone())
    }

    fn collect(&self) -> std::result::Result<config::Map<String, config::Value>, config::ConfigError> {
        let origin = "legacy environment".to_string();
        Ok(LEGACY_KEYS
            .iter()
            .filter_map(|(name, key)| {
                let value = self.lookup(name).filter(|v| !v.trim().is_empty())?;
                Some((key.to_string(), config::Value::new(Some(&origin), value)))
            })
            .collect())
    }
}

fn build(config_path: &str) -> Result<Settings> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name(config_path).required(false))
        .add_source(LegacyEnv::default())
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?
        .try_deserialize()?;
    Ok(settings)
}

pub fn load() -> Result<Settings> {
    let args = Args::parse();

    if let Err(err) = dotenvy::dotenv()
        && !err.not_found()
    {
        return Err(AppError::Settings(format!("cannot read .env file: {err}")));
    }

    let mut settings = build(args.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH))?;
    if let Some(since) = args.since {
        settings.sync.since = Some(since);
    }
    if let Some(level) = args.level {
        settings.app.level = level;
    }

    settings.validate()?;
    Ok(settings)
}
