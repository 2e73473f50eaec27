//! Depth-first expansion of a requested node into the full node set.

use std::collections::{BTreeMap, HashMap, HashSet};

use petgraph::graph::{DiGraph, NodeIndex};
use tracing::{debug, trace};

use super::node::{EdgeKind, NodeKey};
use super::order::prioritized_toposort;
use super::{Resolution, ResolveError};
use crate::catalogue::{Catalogue, DepRef};
use crate::config::ConfigRegistry;
use crate::config::active::RunningConfigs;
use crate::config::types::Linkage;
use crate::consts::NEUTRAL_CONFIG;
use crate::options::BuildOptions;
use crate::platform::host::HostSystem;

/// Walks catalogue dependencies starting from one requested node.
pub struct Resolver<'a> {
  catalogue: &'a Catalogue,
  configs: RunningConfigs<'a>,
  options: &'a BuildOptions,
  requested: NodeKey,
  /// Emitted nodes, in DFS post-order.
  emitted: Vec<NodeKey>,
  emitted_index: HashMap<NodeKey, usize>,
  /// Nodes currently being expanded, outermost first.
  stack: Vec<NodeKey>,
  edges: Vec<(NodeKey, NodeKey, EdgeKind)>,
}

impl<'a> Resolver<'a> {
  pub fn new(
    catalogue: &'a Catalogue,
    registry: &'a ConfigRegistry,
    host: &'a HostSystem,
    options: &'a BuildOptions,
  ) -> Self {
    Self {
      catalogue,
      configs: RunningConfigs::new(registry, host),
      options,
      requested: NodeKey::new("", ""),
      emitted: Vec::new(),
      emitted_index: HashMap::new(),
      stack: Vec::new(),
      edges: Vec::new(),
    }
  }

  /// Resolve `component` for `config` into an ordered [`Resolution`].
  pub fn resolve(mut self, config: &str, component: &str) -> Result<Resolution, ResolveError> {
    self.requested = NodeKey::new(config, component);
    debug!(node = %self.requested, "resolving");

    let roots = self.expand(config, component)?;
    let toolchain_nodes = self.inject_toolchains()?;
    self.add_toolchain_edges(&toolchain_nodes)?;

    self.finish(roots, toolchain_nodes)
  }

  /// Resolve one reference, honoring meta fan-out and mixed redirection.
  ///
  /// Returns the nodes that stand for the reference: one for concrete
  /// configurations, the sub nodes and the merge node for meta ones.
  fn expand(&mut self, config: &str, component: &str) -> Result<Vec<NodeKey>, ResolveError> {
    let def = self.configs.get(config)?;

    if def.is_meta() {
      let mut keys = Vec::new();
      for sub in def.sub_configs(self.options) {
        for key in self.expand(&sub, component)? {
          if !keys.contains(&key) {
            keys.push(key);
          }
        }
      }
      if let Some(merge) = def.merge_component() {
        let merge_key = self.visit(NodeKey::new(config, merge), &keys)?;
        keys.push(merge_key);
      }
      return Ok(keys);
    }

    if let Linkage::Mixed { static_config } = &def.linkage
      && !(config == self.requested.config && component == self.requested.component)
    {
      trace!(config = %config, component = %component, to = %static_config, "redirecting mixed dependency");
      return self.expand(static_config, component);
    }

    Ok(vec![self.visit(NodeKey::new(config, component), &[])?])
  }

  /// Expand the dependencies of a concrete node, then emit it.
  fn visit(&mut self, key: NodeKey, extra_deps: &[NodeKey]) -> Result<NodeKey, ResolveError> {
    if self.emitted_index.contains_key(&key) {
      return Ok(key);
    }
    if let Some(pos) = self.stack.iter().position(|k| *k == key) {
      let mut cycle = self.stack[pos..].to_vec();
      cycle.push(key);
      return Err(ResolveError::DependencyCycle { cycle });
    }

    let catalogue = self.catalogue;
    let def = catalogue.get(&key.component)?;
    let is_cross = self.configs.get(&key.config)?.is_cross();

    self.stack.push(key.clone());
    let mut refs: Vec<&DepRef> = def.deps.iter().collect();
    if is_cross {
      refs.extend(def.cross_deps.iter());
    }

    for dep in refs {
      let deps = match dep {
        DepRef::Bare(component) => self.expand(&key.config, component)?,
        DepRef::Qualified(config, component) => self.expand(config, component)?,
      };
      for dep_key in deps {
        self.edges.push((dep_key, key.clone(), EdgeKind::Declared));
      }
    }
    for dep_key in extra_deps {
      self.edges.push((dep_key.clone(), key.clone(), EdgeKind::Declared));
    }
    self.stack.pop();

    trace!(node = %key, index = self.emitted.len(), "emitted");
    self.emitted_index.insert(key.clone(), self.emitted.len());
    self.emitted.push(key.clone());
    Ok(key)
  }

  /// Add toolchain nodes for every activated configuration until no new
  /// configuration shows up.
  fn inject_toolchains(&mut self) -> Result<BTreeMap<String, Vec<NodeKey>>, ResolveError> {
    let mut injected: BTreeMap<String, Vec<NodeKey>> = BTreeMap::new();
    let catalogue = self.catalogue;
    let mut processed = 0;

    while processed < self.configs.active().len() {
      let def = self.configs.active()[processed];
      processed += 1;

      for toolchain in &def.toolchains {
        let tc_def = catalogue.get(toolchain)?;
        let tc_config = if tc_def.is_neutral_toolchain() {
          NEUTRAL_CONFIG
        } else {
          def.name.as_str()
        };
        debug!(config = %def.name, toolchain = %toolchain, placed_in = %tc_config, "injecting toolchain");
        let keys = self.expand(tc_config, toolchain)?;
        injected.entry(def.name.clone()).or_default().extend(keys);
      }
    }

    Ok(injected)
  }

  /// Make each toolchain precede every node of the configuration needing
  /// it, except the nodes the toolchain itself is built from.
  fn add_toolchain_edges(&mut self, toolchain_nodes: &BTreeMap<String, Vec<NodeKey>>) -> Result<(), ResolveError> {
    for (config, toolchains) in toolchain_nodes {
      for tc in toolchains {
        let upstream = self.upstream_of(tc);
        for node in &self.emitted {
          if node.config != *config || upstream.contains(node) || node == tc {
            continue;
          }
          if self.catalogue.get(&node.component)?.is_toolchain() {
            continue;
          }
          self.edges.push((tc.clone(), node.clone(), EdgeKind::Toolchain));
        }
      }
    }
    Ok(())
  }

  /// Every node `key` transitively depends on.
  fn upstream_of(&self, key: &NodeKey) -> HashSet<NodeKey> {
    let mut seen = HashSet::new();
    let mut pending = vec![key.clone()];
    while let Some(current) = pending.pop() {
      for (from, to, _) in &self.edges {
        if *to == current && seen.insert(from.clone()) {
          pending.push(from.clone());
        }
      }
    }
    seen
  }

  fn finish(
    self,
    roots: Vec<NodeKey>,
    toolchain_nodes: BTreeMap<String, Vec<NodeKey>>,
  ) -> Result<Resolution, ResolveError> {
    let mut graph: DiGraph<NodeKey, EdgeKind> = DiGraph::new();
    let mut index: HashMap<NodeKey, NodeIndex> = HashMap::new();
    for key in &self.emitted {
      index.insert(key.clone(), graph.add_node(key.clone()));
    }
    for (from, to, kind) in &self.edges {
      let (a, b) = (index[from], index[to]);
      if graph.find_edge(a, b).is_none() {
        graph.add_edge(a, b, *kind);
      }
    }

    // Toolchains injected for a configuration sort right before its first node.
    let mut first_of_config: HashMap<&str, usize> = HashMap::new();
    for (i, key) in self.emitted.iter().enumerate() {
      if !toolchain_nodes.values().flatten().any(|tc| tc == key) {
        first_of_config.entry(key.config.as_str()).or_insert(i);
      }
    }
    let mut toolchain_pos: HashMap<&NodeKey, usize> = HashMap::new();
    for (config, tcs) in &toolchain_nodes {
      if let Some(&first) = first_of_config.get(config.as_str()) {
        for tc in tcs {
          let pos = toolchain_pos.entry(tc).or_insert(2 * first);
          *pos = (*pos).min(2 * first);
        }
      }
    }

    let priority = |idx: NodeIndex| {
      let key = &graph[idx];
      let rank = u8::from(key.config != NEUTRAL_CONFIG);
      let pos = toolchain_pos
        .get(key)
        .copied()
        .unwrap_or_else(|| 2 * self.emitted_index[key] + 1);
      (rank, pos)
    };

    let order = match prioritized_toposort(&graph, priority) {
      Ok(sorted) => sorted.into_iter().map(|idx| graph[idx].clone()).collect(),
      Err(left) => {
        return Err(ResolveError::DependencyCycle {
          cycle: left.into_iter().map(|idx| graph[idx].clone()).collect(),
        });
      }
    };

    let configs = self.configs.active().iter().map(|d| d.name.clone()).collect();
    let resolution = Resolution {
      requested: self.requested,
      roots,
      order,
      toolchain_nodes,
      configs,
      graph,
      index,
    };
    debug!(nodes = resolution.order.len(), configs = ?resolution.configs, "resolved");
    Ok(resolution)
  }
}
