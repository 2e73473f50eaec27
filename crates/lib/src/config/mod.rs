//! Build configuration registry.
//!
//! [`ConfigRegistry`] holds every known [`ConfigDef`]. During resolution
//! configurations are activated lazily through [`active::RunningConfigs`],
//! and [`active::finalize`] turns the activated set into [`active::BuildEnv`]s
//! carrying concrete directories and cross environments.

pub mod active;
pub mod builtin;
pub mod cross;
pub mod types;

use std::collections::BTreeMap;
use std::path::PathBuf;

use thiserror::Error;

pub use types::{AndroidArch, ConfigDef, ConfigKind, CrossTarget, Family, Linkage, SubConfigs};

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("unknown configuration: {0}")]
  UnknownConfig(String),

  #[error("configuration {config} is not compatible with host {host}")]
  IncompatibleHost { config: String, host: String },

  #[error("configuration {config} needs toolchain {toolchain}, which is not part of the build")]
  MissingToolchain { config: String, toolchain: String },

  #[error("cannot locate {what} for sdk {sdk}: {message}")]
  Sdk { sdk: String, what: String, message: String },

  #[error("failed to write {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

#[derive(Debug, Clone, Default)]
pub struct ConfigRegistry {
  configs: BTreeMap<String, ConfigDef>,
}

impl ConfigRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn builtin() -> Self {
    let mut registry = Self::new();
    builtin::register_builtin(&mut registry);
    registry
  }

  pub fn register(&mut self, def: ConfigDef) {
    self.configs.insert(def.name.clone(), def);
  }

  pub fn get(&self, name: &str) -> Result<&ConfigDef, ConfigError> {
    self
      .configs
      .get(name)
      .ok_or_else(|| ConfigError::UnknownConfig(name.to_string()))
  }

  pub fn iter(&self) -> impl Iterator<Item = &ConfigDef> {
    self.configs.values()
  }
}
