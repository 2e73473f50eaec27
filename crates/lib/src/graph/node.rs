use std::fmt;

/// Identity of a buildable unit: one component built for one configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey {
  pub config: String,
  pub component: String,
}

impl NodeKey {
  pub fn new(config: impl Into<String>, component: impl Into<String>) -> Self {
    Self {
      config: config.into(),
      component: component.into(),
    }
  }
}

impl fmt::Display for NodeKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.config, self.component)
  }
}

/// Why one node must run before another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
  /// From a catalogue dependency, a cross dependency or a merge node.
  Declared,
  /// A toolchain preceding the nodes of the configuration requiring it.
  Toolchain,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn display_joins_with_slash() {
    assert_eq!(NodeKey::new("native_static", "icu4c").to_string(), "native_static/icu4c");
  }
}
