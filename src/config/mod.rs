//! Configuration layer: typed settings with layered precedence (file → env → CLI).
//!
//! Annotation behavior is declared per scope. The `[filter]` table is the root
//! scope; each `[[filter.directories]]` entry narrows it for request paths under
//! its `path`. A request resolves its [`BehaviorConfig`] by folding every
//! matching scope onto the root, broadest first.

mod cli;

pub use cli::{AnnotateArgs, CliArgs, Command, GlobalOverrides, QueueArgs};

use std::str::FromStr;

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::domain::behavior::{BehaviorConfig, BehaviorOverrides, merge};
use crate::domain::types::BehaviorAction;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "amberlink";
const DEFAULT_DATABASE_PATH: &str = "amberlink.db";

#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub filter: FilterSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub path: String,
    pub create_if_missing: bool,
}

/// Root scope plus directory scopes sorted broadest first.
#[derive(Debug, Clone, Default)]
pub struct FilterSettings {
    pub root: BehaviorOverrides,
    pub directories: Vec<DirectoryScope>,
}

#[derive(Debug, Clone)]
pub struct DirectoryScope {
    pub path: String,
    pub overrides: BehaviorOverrides,
}

impl DirectoryScope {
    /// Whether `path` lies at or below this scope, segment by segment.
    pub fn contains(&self, path: &str) -> bool {
        let scope = self.path.trim_end_matches('/');
        if scope.is_empty() {
            return true;
        }
        match path.strip_prefix(scope) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}

impl FilterSettings {
    /// Overrides in effect for `uri` before defaults are applied.
    pub fn overrides_for(&self, uri: &str) -> BehaviorOverrides {
        let path = uri.split(['?', '#']).next().unwrap_or_default();
        self.directories
            .iter()
            .filter(|scope| scope.contains(path))
            .fold(self.root.clone(), |acc, scope| merge(&acc, &scope.overrides))
    }

    pub fn resolve(&self, uri: &str) -> BehaviorConfig {
        self.overrides_for(uri).resolve()
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("AMBERLINK").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_global_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    filter: RawScope,
}

impl RawSettings {
    fn apply_global_overrides(&mut self, overrides: &GlobalOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(path) = overrides.database_path.as_ref() {
            self.database.path = Some(path.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            database,
            filter,
        } = raw;

        let logging = build_logging_settings(logging)?;
        let database = build_database_settings(database)?;
        let filter = build_filter_settings(filter, &database)?;

        Ok(Self {
            logging,
            database,
            filter,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let path = match database.path {
        Some(value) => value.trim().to_string(),
        None => DEFAULT_DATABASE_PATH.to_string(),
    };
    if path.is_empty() {
        return Err(LoadError::invalid("database.path", "must not be empty"));
    }

    Ok(DatabaseSettings {
        path,
        create_if_missing: database.create_if_missing.unwrap_or(true),
    })
}

fn build_filter_settings(
    filter: RawScope,
    database: &DatabaseSettings,
) -> Result<FilterSettings, LoadError> {
    if filter.path.is_some() {
        return Err(LoadError::invalid(
            "filter.path",
            "the root scope applies to every path; declare a [[filter.directories]] entry instead",
        ));
    }

    let mut directories = Vec::with_capacity(filter.directories.len());
    for scope in &filter.directories {
        if !scope.directories.is_empty() {
            return Err(LoadError::invalid(
                "filter.directories",
                "directory scopes cannot be nested",
            ));
        }
        let path = scope
            .path
            .as_deref()
            .map(str::trim)
            .ok_or_else(|| LoadError::invalid("filter.directories.path", "is required"))?;
        if !path.starts_with('/') {
            return Err(LoadError::invalid(
                "filter.directories.path",
                format!("`{path}` must start with `/`"),
            ));
        }
        directories.push(DirectoryScope {
            path: path.to_string(),
            overrides: scope.overrides()?,
        });
    }
    directories.sort_by_key(|scope| scope.path.trim_end_matches('/').len());

    let mut root = filter.overrides()?;
    if root.store_location.is_none() {
        root.store_location = Some(database.path.clone());
    }

    Ok(FilterSettings { root, directories })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    path: Option<String>,
    create_if_missing: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawScope {
    path: Option<String>,
    enabled: Option<bool>,
    store_location: Option<String>,
    behavior_up: Option<String>,
    behavior_down: Option<String>,
    hover_delay_up: Option<i64>,
    hover_delay_down: Option<i64>,
    country: Option<String>,
    country_behavior_up: Option<String>,
    country_behavior_down: Option<String>,
    country_hover_delay_up: Option<i64>,
    country_hover_delay_down: Option<i64>,
    cache_delivery: Option<bool>,
    directories: Vec<RawScope>,
}

impl RawScope {
    fn overrides(&self) -> Result<BehaviorOverrides, LoadError> {
        Ok(BehaviorOverrides {
            enabled: self.enabled,
            store_location: self
                .store_location
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string),
            behavior_up: action(self.behavior_up.as_deref()),
            behavior_down: action(self.behavior_down.as_deref()),
            hover_delay_up: delay(self.hover_delay_up, "filter.hover_delay_up")?,
            hover_delay_down: delay(self.hover_delay_down, "filter.hover_delay_down")?,
            country: self.country.as_ref().map(|value| value.trim().to_string()),
            country_behavior_up: action(self.country_behavior_up.as_deref()),
            country_behavior_down: action(self.country_behavior_down.as_deref()),
            country_hover_delay_up: delay(
                self.country_hover_delay_up,
                "filter.country_hover_delay_up",
            )?,
            country_hover_delay_down: delay(
                self.country_hover_delay_down,
                "filter.country_hover_delay_down",
            )?,
            cache_delivery: self.cache_delivery,
        })
    }
}

fn action(value: Option<&str>) -> Option<BehaviorAction> {
    value.map(BehaviorAction::from_directive)
}

fn delay(value: Option<i64>, key: &'static str) -> Result<Option<u32>, LoadError> {
    value
        .map(|seconds| {
            u32::try_from(seconds)
                .map_err(|_| LoadError::invalid(key, format!("`{seconds}` is not a valid delay")))
        })
        .transpose()
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[cfg(test)]
mod tests;
