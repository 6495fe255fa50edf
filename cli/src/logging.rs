//! The `[log]` section and subscriber setup.
//!
//! `RUST_LOG`, when set and valid, replaces the filter built from the file.
//! Logs go to stderr so `netrpc call` output stays pipeable.

use std::collections::BTreeMap;

use anyhow::Context;
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// Level for everything without a component override.
    pub level: String,
    /// Per-crate overrides, e.g. `netrpc_core = "debug"`.
    pub components: BTreeMap<String, String>,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".into(),
            components: BTreeMap::new(),
            format: LogFormat::Text,
        }
    }
}

impl LogConfig {
    /// Filter described by the file alone, ignoring `RUST_LOG`.
    pub fn configured_filter(&self) -> anyhow::Result<EnvFilter> {
        let level: LevelFilter = self
            .level
            .parse()
            .with_context(|| format!("[log] level '{}'", self.level))?;
        let mut filter = EnvFilter::default().add_directive(level.into());

        for (component, level) in &self.components {
            level
                .parse::<LevelFilter>()
                .with_context(|| format!("[log] components.{component} = '{level}'"))?;
            let target = component.replace('-', "_");
            let directive: Directive = format!("{target}={}", level.to_lowercase())
                .parse()
                .with_context(|| format!("[log] component name '{component}'"))?;
            filter = filter.add_directive(directive);
        }
        Ok(filter)
    }

    /// Install the global subscriber. Call once at startup.
    pub fn init(&self) -> anyhow::Result<()> {
        let filter = match EnvFilter::try_from_default_env() {
            Ok(from_env) => from_env,
            Err(_) => self.configured_filter()?,
        };

        let registry = tracing_subscriber::registry().with(filter);
        let installed = match self.format {
            LogFormat::Json => registry
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init(),
            LogFormat::Text => registry
                .with(fmt::layer().with_writer(std::io::stderr))
                .try_init(),
        };
        installed.context("installing the tracing subscriber")
    }
}
