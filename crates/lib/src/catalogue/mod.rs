//! Component catalogue.
//!
//! A name to [`ComponentDef`] registry. It is filled once at start-up by
//! [`builtin::register_builtin`] and optional JSON files, then only read.

pub mod builtin;
pub mod types;

use std::collections::BTreeMap;
use std::path::Path;

use thiserror::Error;
use tracing::debug;

pub use types::{
  BuildDef, BuildMethod, ComponentDef, DepRef, Hook, HookCwd, MergeMode, RemoteFile, SourceDef, ToolchainInfo,
};

#[derive(Debug, Error)]
pub enum CatalogueError {
  #[error("unknown component: {0}")]
  UnknownComponent(String),

  #[error("failed to read catalogue {path}: {source}")]
  Read {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid catalogue {path}: {source}")]
  Parse {
    path: String,
    #[source]
    source: serde_json::Error,
  },
}

#[derive(Debug, Clone, Default)]
pub struct Catalogue {
  components: BTreeMap<String, ComponentDef>,
}

impl Catalogue {
  pub fn new() -> Self {
    Self::default()
  }

  /// Catalogue holding the builtin recipes.
  pub fn builtin() -> Self {
    let mut catalogue = Self::new();
    builtin::register_builtin(&mut catalogue);
    catalogue
  }

  /// Add or replace a definition.
  pub fn register(&mut self, def: ComponentDef) {
    debug!(component = %def.name, "registering component");
    self.components.insert(def.name.clone(), def);
  }

  pub fn get(&self, name: &str) -> Result<&ComponentDef, CatalogueError> {
    self
      .components
      .get(name)
      .ok_or_else(|| CatalogueError::UnknownComponent(name.to_string()))
  }

  pub fn contains(&self, name: &str) -> bool {
    self.components.contains_key(name)
  }

  pub fn iter(&self) -> impl Iterator<Item = &ComponentDef> {
    self.components.values()
  }

  pub fn len(&self) -> usize {
    self.components.len()
  }

  pub fn is_empty(&self) -> bool {
    self.components.is_empty()
  }

  /// Merge definitions from a JSON array of components; later entries
  /// replace existing ones with the same name.
  pub fn load_json(&mut self, path: &Path) -> Result<usize, CatalogueError> {
    let content = std::fs::read_to_string(path).map_err(|source| CatalogueError::Read {
      path: path.display().to_string(),
      source,
    })?;
    let defs: Vec<ComponentDef> = serde_json::from_str(&content).map_err(|source| CatalogueError::Parse {
      path: path.display().to_string(),
      source,
    })?;
    let count = defs.len();
    for def in defs {
      self.register(def);
    }
    Ok(count)
  }
}
