//! Dependency graph resolution.
//!
//! A requested `(config, component)` pair is expanded depth-first into every
//! node it needs. Meta configurations fan out into their sub-configurations,
//! mixed configurations redirect dependencies to their static partner, and
//! the toolchains of every configuration reached are injected ahead of that
//! configuration's nodes. The result is a [`Resolution`]: a petgraph
//! [`DiGraph`] plus a stable topological order over it.

mod node;
mod order;
mod resolve;

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use thiserror::Error;

use crate::catalogue::CatalogueError;
use crate::config::ConfigError;

pub use node::{EdgeKind, NodeKey};
pub use order::prioritized_toposort;
pub use resolve::Resolver;

#[derive(Debug, Error)]
pub enum ResolveError {
  #[error(transparent)]
  Catalogue(#[from] CatalogueError),

  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error("dependency cycle: {}", format_cycle(.cycle))]
  DependencyCycle { cycle: Vec<NodeKey> },
}

fn format_cycle(cycle: &[NodeKey]) -> String {
  cycle.iter().map(ToString::to_string).collect::<Vec<_>>().join(" -> ")
}

/// The outcome of resolving one requested node.
#[derive(Debug, Clone)]
pub struct Resolution {
  pub requested: NodeKey,
  /// Nodes standing for the request itself: one node, or the sub nodes and
  /// merge node of a meta configuration.
  pub roots: Vec<NodeKey>,
  /// Every node, dependencies first.
  pub order: Vec<NodeKey>,
  /// Toolchain nodes injected per requiring configuration.
  pub toolchain_nodes: BTreeMap<String, Vec<NodeKey>>,
  /// Activated configurations, in activation order.
  pub configs: Vec<String>,
  graph: DiGraph<NodeKey, EdgeKind>,
  index: HashMap<NodeKey, NodeIndex>,
}

impl Resolution {
  pub fn contains(&self, key: &NodeKey) -> bool {
    self.index.contains_key(key)
  }

  pub fn is_root(&self, key: &NodeKey) -> bool {
    self.roots.contains(key)
  }

  /// Direct dependencies of `key`, in graph order.
  pub fn dependencies(&self, key: &NodeKey) -> Vec<&NodeKey> {
    self.neighbors(key, Direction::Incoming)
  }

  /// Nodes directly depending on `key`.
  pub fn dependents(&self, key: &NodeKey) -> Vec<&NodeKey> {
    self.neighbors(key, Direction::Outgoing)
  }

  fn neighbors(&self, key: &NodeKey, direction: Direction) -> Vec<&NodeKey> {
    let Some(&idx) = self.index.get(key) else {
      return Vec::new();
    };
    let mut keys: Vec<&NodeKey> = self
      .graph
      .neighbors_directed(idx, direction)
      .map(|n| &self.graph[n])
      .collect();
    keys.sort_by_key(|k| self.position(k));
    keys
  }

  fn position(&self, key: &NodeKey) -> usize {
    self.order.iter().position(|k| k == key).unwrap_or(usize::MAX)
  }

  /// Graphviz rendering; toolchain edges are dashed.
  pub fn to_dot(&self) -> String {
    let mut out = String::from("digraph crossbuild {\n  rankdir=LR;\n");
    for key in &self.order {
      let shape = if self.is_root(key) { "doublecircle" } else { "box" };
      let _ = writeln!(out, "  \"{key}\" [shape={shape}];");
    }
    for key in &self.order {
      for dep in self.dependencies(key) {
        let Some(edge) = self.graph.find_edge(self.index[dep], self.index[key]) else {
          continue;
        };
        match self.graph[edge] {
          EdgeKind::Declared => {
            let _ = writeln!(out, "  \"{dep}\" -> \"{key}\";");
          }
          EdgeKind::Toolchain => {
            let _ = writeln!(out, "  \"{dep}\" -> \"{key}\" [style=dashed];");
          }
        }
      }
    }
    out.push_str("}\n");
    out
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::catalogue::{Catalogue, ComponentDef, DepRef};
  use crate::config::ConfigRegistry;
  use crate::options::BuildOptions;
  use crate::platform::host::HostSystem;

  fn with_deps(name: &str, deps: &[DepRef]) -> ComponentDef {
    ComponentDef {
      deps: deps.to_vec(),
      ..ComponentDef::new(name)
    }
  }

  fn bare(name: &str) -> DepRef {
    DepRef::from(name)
  }

  fn qualified(config: &str, name: &str) -> DepRef {
    DepRef::Qualified(config.to_string(), name.to_string())
  }

  fn catalogue(defs: Vec<ComponentDef>) -> Catalogue {
    let mut catalogue = Catalogue::builtin();
    for def in defs {
      catalogue.register(def);
    }
    catalogue
  }

  fn resolve_on(
    catalogue: &Catalogue,
    host: HostSystem,
    options: &BuildOptions,
    config: &str,
    component: &str,
  ) -> Result<Resolution, ResolveError> {
    let registry = ConfigRegistry::builtin();
    Resolver::new(catalogue, &registry, &host, options).resolve(config, component)
  }

  fn keys(pairs: &[(&str, &str)]) -> Vec<NodeKey> {
    pairs.iter().map(|(c, n)| NodeKey::new(*c, *n)).collect()
  }

  #[test]
  fn cross_config_dependency_sorts_first() {
    let catalogue = catalogue(vec![
      ComponentDef::new("core"),
      ComponentDef::new("codegen"),
      with_deps("tools", &[bare("core"), qualified("neutral", "codegen")]),
    ]);
    let resolution = resolve_on(&catalogue, HostSystem::Debian, &BuildOptions::default(), "native_dyn", "tools").unwrap();

    assert_eq!(
      resolution.order,
      keys(&[("neutral", "codegen"), ("native_dyn", "core"), ("native_dyn", "tools")])
    );
    assert_eq!(resolution.roots, keys(&[("native_dyn", "tools")]));
    assert_eq!(
      resolution.dependencies(&NodeKey::new("native_dyn", "tools")),
      vec![&NodeKey::new("neutral", "codegen"), &NodeKey::new("native_dyn", "core")]
    );
  }

  #[test]
  fn shared_dependency_appears_once() {
    let catalogue = catalogue(vec![
      ComponentDef::new("base"),
      with_deps("left", &[bare("base")]),
      with_deps("right", &[bare("base")]),
      with_deps("top", &[bare("left"), bare("right")]),
    ]);
    let resolution = resolve_on(&catalogue, HostSystem::Debian, &BuildOptions::default(), "native_static", "top").unwrap();

    assert_eq!(
      resolution.order,
      keys(&[
        ("native_static", "base"),
        ("native_static", "left"),
        ("native_static", "right"),
        ("native_static", "top")
      ])
    );
    assert_eq!(resolution.dependents(&NodeKey::new("native_static", "base")).len(), 2);
  }

  #[test]
  fn resolution_is_deterministic() {
    let catalogue = Catalogue::builtin();
    let options = BuildOptions::default();
    let first = resolve_on(&catalogue, HostSystem::Debian, &options, "native_static", "zim-tools").unwrap();
    let second = resolve_on(&catalogue, HostSystem::Debian, &options, "native_static", "zim-tools").unwrap();
    assert_eq!(first.order, second.order);
    assert_eq!(first.to_dot(), second.to_dot());
  }

  #[test]
  fn every_node_follows_its_dependencies() {
    let catalogue = Catalogue::builtin();
    let resolution = resolve_on(
      &catalogue,
      HostSystem::Debian,
      &BuildOptions::default(),
      "aarch64_musl_static",
      "zim-tools",
    )
    .unwrap();

    for (i, key) in resolution.order.iter().enumerate() {
      for dep in resolution.dependencies(key) {
        let dep_pos = resolution.order.iter().position(|k| k == dep).unwrap();
        assert!(dep_pos < i, "{dep} must precede {key}");
      }
    }
    let mut unique = resolution.order.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), resolution.order.len());
  }

  #[test]
  fn mixed_redirects_dependencies_only() {
    let catalogue = catalogue(vec![ComponentDef::new("lib"), with_deps("app", &[bare("lib")])]);
    let resolution = resolve_on(&catalogue, HostSystem::Debian, &BuildOptions::default(), "native_mixed", "app").unwrap();

    assert_eq!(resolution.order, keys(&[("native_static", "lib"), ("native_mixed", "app")]));
    assert_eq!(resolution.configs, vec!["native_mixed", "native_static"]);
  }

  #[test]
  fn mixed_requested_directly_as_dependency_target_is_kept() {
    let catalogue = catalogue(vec![ComponentDef::new("lib")]);
    let resolution = resolve_on(&catalogue, HostSystem::Debian, &BuildOptions::default(), "native_mixed", "lib").unwrap();
    assert_eq!(resolution.order, keys(&[("native_mixed", "lib")]));
  }

  #[test]
  fn meta_fans_out_per_arch_with_toolchains() {
    let catalogue = catalogue(vec![ComponentDef::new("lib")]);
    let options = BuildOptions {
      android_arch: vec!["arm".to_string(), "arm64".to_string()],
      ..Default::default()
    };
    let resolution = resolve_on(&catalogue, HostSystem::Debian, &options, "android", "lib").unwrap();

    assert_eq!(
      resolution.order,
      keys(&[
        ("android_arm", "android-ndk"),
        ("android_arm", "lib"),
        ("android_arm64", "android-ndk"),
        ("android_arm64", "lib")
      ])
    );
    assert_eq!(resolution.roots, keys(&[("android_arm", "lib"), ("android_arm64", "lib")]));
    assert_eq!(
      resolution.toolchain_nodes["android_arm64"],
      keys(&[("android_arm64", "android-ndk")])
    );
  }

  #[test]
  fn meta_merge_node_comes_last() {
    let catalogue = catalogue(vec![ComponentDef::new("lib")]);
    let resolution = resolve_on(&catalogue, HostSystem::Darwin, &BuildOptions::default(), "ios_multi", "lib").unwrap();

    assert_eq!(
      resolution.order,
      keys(&[
        ("ios_arm64", "lib"),
        ("iossimulator_x86_64", "lib"),
        ("ios_multi", "_ios_fat_lib")
      ])
    );
    let merge = NodeKey::new("ios_multi", "_ios_fat_lib");
    assert!(resolution.is_root(&merge));
    assert_eq!(resolution.dependencies(&merge).len(), 2);
  }

  #[test]
  fn neutral_toolchain_precedes_cross_nodes() {
    let catalogue = catalogue(vec![ComponentDef::new("lib"), with_deps("app", &[bare("lib")])]);
    let resolution = resolve_on(
      &catalogue,
      HostSystem::Debian,
      &BuildOptions::default(),
      "aarch64_musl_static",
      "app",
    )
    .unwrap();

    assert_eq!(
      resolution.order,
      keys(&[
        ("neutral", "aarch64_musl"),
        ("aarch64_musl_static", "lib"),
        ("aarch64_musl_static", "app")
      ])
    );
    let dot = resolution.to_dot();
    assert!(dot.contains("\"neutral/aarch64_musl\" -> \"aarch64_musl_static/lib\" [style=dashed];"));
  }

  #[test]
  fn cross_deps_only_apply_when_cross_compiling() {
    let catalogue = Catalogue::builtin();
    let options = BuildOptions::default();

    let native = resolve_on(&catalogue, HostSystem::Debian, &options, "native_static", "icu4c").unwrap();
    assert_eq!(native.order, keys(&[("native_static", "icu4c")]));

    let cross = resolve_on(&catalogue, HostSystem::Debian, &options, "aarch64_musl_static", "icu4c").unwrap();
    assert!(cross.contains(&NodeKey::new("native_static", "icu4c")));
    let native_pos = cross.order.iter().position(|k| k.config == "native_static").unwrap();
    let cross_pos = cross.order.iter().position(|k| k.config == "aarch64_musl_static").unwrap();
    assert!(native_pos < cross_pos);
  }

  #[test]
  fn cycle_is_reported() {
    let catalogue = catalogue(vec![
      with_deps("a", &[bare("b")]),
      with_deps("b", &[bare("c")]),
      with_deps("c", &[bare("a")]),
    ]);
    let err = resolve_on(&catalogue, HostSystem::Debian, &BuildOptions::default(), "native_dyn", "a").unwrap_err();

    let ResolveError::DependencyCycle { cycle } = err else {
      panic!("expected a dependency cycle");
    };
    assert_eq!(
      cycle,
      keys(&[
        ("native_dyn", "a"),
        ("native_dyn", "b"),
        ("native_dyn", "c"),
        ("native_dyn", "a")
      ])
    );
  }

  #[test]
  fn unknown_component_and_incompatible_host_fail_early() {
    let catalogue = catalogue(vec![with_deps("app", &[bare("missing")])]);
    let err = resolve_on(&catalogue, HostSystem::Debian, &BuildOptions::default(), "native_dyn", "app").unwrap_err();
    assert!(matches!(err, ResolveError::Catalogue(CatalogueError::UnknownComponent(ref n)) if n == "missing"));

    let err = resolve_on(&Catalogue::builtin(), HostSystem::Debian, &BuildOptions::default(), "ios_multi", "zlib")
      .unwrap_err();
    assert!(matches!(err, ResolveError::Config(ConfigError::IncompatibleHost { .. })));
  }
}
