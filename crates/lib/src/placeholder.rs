//! Placeholder parsing and substitution for catalogue arguments.
//!
//! Component recipes are static data, but their configure options, scripts
//! and hooks need paths that only exist once a node is laid out. Arguments
//! carry placeholders that the step instantiator substitutes per node.
//!
//! # Placeholder Formats
//!
//! - `$${source_dir}`, `$${build_dir}`, `$${install_dir}` - directories of the current node
//! - `$${libprefix}` - library directory relative to the install prefix
//! - `$${config}`, `$${component}`, `$${arch}`, `$${jobs}`
//! - `$${node:<config>:<component>:<field>}` - a directory of a sibling node,
//!   where field is `source_dir`, `build_dir` or `install_dir`
//!
//! Single `$` characters pass through unchanged so `$HOME` style variables
//! stay intact. `$$${` produces a literal `$${`.
//!
//! # Example
//!
//! ```
//! use crossbuild_lib::placeholder::{parse, Placeholder, Segment};
//!
//! let segments = parse("--prefix=$${install_dir}").unwrap();
//! assert_eq!(segments, vec![
//!     Segment::Literal("--prefix=".to_string()),
//!     Segment::Placeholder(Placeholder::InstallDir),
//! ]);
//! ```

use thiserror::Error;

/// Directory of a node that can be referenced from another node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeField {
  SourceDir,
  BuildDir,
  InstallDir,
}

impl NodeField {
  fn parse(s: &str) -> Option<Self> {
    match s {
      "source_dir" => Some(Self::SourceDir),
      "build_dir" => Some(Self::BuildDir),
      "install_dir" => Some(Self::InstallDir),
      _ => None,
    }
  }
}

/// A parsed placeholder reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placeholder {
  SourceDir,
  BuildDir,
  InstallDir,
  Libprefix,
  Config,
  Component,
  Arch,
  Jobs,
  /// `$${node:<config>:<component>:<field>}`
  Node {
    config: String,
    component: String,
    field: NodeField,
  },
}

/// A segment of parsed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  Literal(String),
  Placeholder(Placeholder),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaceholderError {
  #[error("unclosed placeholder at position {0}")]
  Unclosed(usize),

  #[error("unknown placeholder: {0}")]
  Unknown(String),

  #[error("malformed placeholder: {0}")]
  Malformed(String),

  #[error("unresolved node {config}/{component}")]
  UnresolvedNode { config: String, component: String },
}

/// Supplies values for placeholders of one node.
pub trait Resolver {
  fn resolve(&self, placeholder: &Placeholder) -> Result<String, PlaceholderError>;
}

/// Parse a string containing placeholders into segments.
pub fn parse(input: &str) -> Result<Vec<Segment>, PlaceholderError> {
  let mut segments = Vec::new();
  let mut literal = String::new();
  let mut chars = input.char_indices().peekable();

  while let Some((pos, ch)) = chars.next() {
    if ch != '$' {
      literal.push(ch);
      continue;
    }

    if !matches!(chars.peek(), Some((_, '$'))) {
      literal.push('$');
      continue;
    }
    chars.next();

    match chars.peek() {
      Some((_, '$')) => {
        chars.next();
        if matches!(chars.peek(), Some((_, '{'))) {
          chars.next();
          literal.push_str("$${");
        } else {
          literal.push_str("$$$");
        }
      }
      Some((_, '{')) => {
        chars.next();
        if !literal.is_empty() {
          segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }

        let mut content = String::new();
        let mut closed = false;
        for (_, c) in chars.by_ref() {
          if c == '}' {
            closed = true;
            break;
          }
          content.push(c);
        }
        if !closed {
          return Err(PlaceholderError::Unclosed(pos));
        }
        segments.push(Segment::Placeholder(parse_content(&content)?));
      }
      _ => literal.push_str("$$"),
    }
  }

  if !literal.is_empty() {
    segments.push(Segment::Literal(literal));
  }

  Ok(segments)
}

fn parse_content(content: &str) -> Result<Placeholder, PlaceholderError> {
  let simple = match content {
    "source_dir" => Some(Placeholder::SourceDir),
    "build_dir" => Some(Placeholder::BuildDir),
    "install_dir" => Some(Placeholder::InstallDir),
    "libprefix" => Some(Placeholder::Libprefix),
    "config" => Some(Placeholder::Config),
    "component" => Some(Placeholder::Component),
    "arch" => Some(Placeholder::Arch),
    "jobs" => Some(Placeholder::Jobs),
    _ => None,
  };
  if let Some(p) = simple {
    return Ok(p);
  }

  let Some(rest) = content.strip_prefix("node:") else {
    return Err(PlaceholderError::Unknown(content.to_string()));
  };

  let parts: Vec<&str> = rest.split(':').collect();
  let [config, component, field] = parts.as_slice() else {
    return Err(PlaceholderError::Malformed(format!(
      "expected node:<config>:<component>:<field>, got '{content}'"
    )));
  };
  let field = NodeField::parse(field).ok_or_else(|| PlaceholderError::Unknown(format!("node field '{field}'")))?;

  Ok(Placeholder::Node {
    config: config.to_string(),
    component: component.to_string(),
    field,
  })
}

/// Parse and substitute in one step.
pub fn substitute(input: &str, resolver: &impl Resolver) -> Result<String, PlaceholderError> {
  let segments = parse(input)?;
  let mut result = String::new();
  for segment in &segments {
    match segment {
      Segment::Literal(s) => result.push_str(s),
      Segment::Placeholder(p) => result.push_str(&resolver.resolve(p)?),
    }
  }
  Ok(result)
}

/// Substitute every element of an argument list.
pub fn substitute_all(args: &[String], resolver: &impl Resolver) -> Result<Vec<String>, PlaceholderError> {
  args.iter().map(|arg| substitute(arg, resolver)).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  struct TestResolver;

  impl Resolver for TestResolver {
    fn resolve(&self, placeholder: &Placeholder) -> Result<String, PlaceholderError> {
      match placeholder {
        Placeholder::InstallDir => Ok("/w/BUILD_native_dyn/INSTALL".to_string()),
        Placeholder::Libprefix => Ok("lib64".to_string()),
        Placeholder::Node {
          config,
          component,
          field: NodeField::BuildDir,
        } if config == "native_static" && component == "icu4c" => Ok("/w/BUILD_native_static/icu4c".to_string()),
        Placeholder::Node { config, component, .. } => Err(PlaceholderError::UnresolvedNode {
          config: config.clone(),
          component: component.clone(),
        }),
        _ => Ok("x".to_string()),
      }
    }
  }

  #[test]
  fn literal_only() {
    assert_eq!(
      parse("--disable-shared").unwrap(),
      vec![Segment::Literal("--disable-shared".to_string())]
    );
  }

  #[test]
  fn shell_variables_pass_through() {
    assert_eq!(substitute("$HOME/bin:$PATH", &TestResolver).unwrap(), "$HOME/bin:$PATH");
  }

  #[test]
  fn escaped_placeholder_is_literal() {
    assert_eq!(substitute("$$${install_dir}", &TestResolver).unwrap(), "$${install_dir}");
  }

  #[test]
  fn substitutes_multiple_placeholders() {
    let out = substitute("--libdir=$${install_dir}/$${libprefix}", &TestResolver).unwrap();
    assert_eq!(out, "--libdir=/w/BUILD_native_dyn/INSTALL/lib64");
  }

  #[test]
  fn node_placeholder_looks_up_sibling() {
    let out = substitute("--with-cross-build=$${node:native_static:icu4c:build_dir}", &TestResolver).unwrap();
    assert_eq!(out, "--with-cross-build=/w/BUILD_native_static/icu4c");
  }

  #[test]
  fn unresolved_node_is_an_error() {
    let err = substitute("$${node:win32_static:zlib:install_dir}", &TestResolver).unwrap_err();
    assert!(matches!(err, PlaceholderError::UnresolvedNode { .. }));
  }

  #[test]
  fn unclosed_placeholder() {
    assert_eq!(parse("a$${build_dir").unwrap_err(), PlaceholderError::Unclosed(1));
  }

  #[test]
  fn unknown_and_malformed() {
    assert!(matches!(parse("$${out}").unwrap_err(), PlaceholderError::Unknown(_)));
    assert!(matches!(
      parse("$${node:native_dyn}").unwrap_err(),
      PlaceholderError::Malformed(_)
    ));
    assert!(matches!(
      parse("$${node:a:b:lib_dir}").unwrap_err(),
      PlaceholderError::Unknown(_)
    ));
  }
}
