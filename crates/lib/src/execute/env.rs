//! Process environment composition.
//!
//! Values are kept structured (path lists, flag lists) while overlays are
//! applied and only joined into strings when a process is spawned.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;

use crate::consts::PATH_SEPARATOR;

/// Variables treated as search paths when inherited from the process.
const PATH_VARS: &[&str] = &["PATH", "LD_LIBRARY_PATH", "PKG_CONFIG_PATH", "PKG_CONFIG_LIBDIR"];

/// Variables treated as whitespace separated flags when inherited.
const FLAG_VARS: &[&str] = &["CFLAGS", "CXXFLAGS", "CPPFLAGS", "LDFLAGS", "LIBS"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvValue {
  Plain(String),
  /// Joined with the platform path separator.
  Paths(Vec<String>),
  /// Joined with spaces.
  Flags(Vec<String>),
}

impl EnvValue {
  fn render(&self) -> String {
    match self {
      Self::Plain(s) => s.clone(),
      Self::Paths(parts) => parts.join(PATH_SEPARATOR.to_string().as_str()),
      Self::Flags(parts) => parts.join(" "),
    }
  }

  fn into_paths(self) -> Vec<String> {
    match self {
      Self::Plain(s) => split_paths(&s),
      Self::Paths(parts) | Self::Flags(parts) => parts,
    }
  }

  fn into_flags(self) -> Vec<String> {
    match self {
      Self::Plain(s) => s.split_whitespace().map(str::to_string).collect(),
      Self::Paths(parts) | Self::Flags(parts) => parts,
    }
  }
}

fn split_paths(s: &str) -> Vec<String> {
  s.split(PATH_SEPARATOR).filter(|p| !p.is_empty()).map(str::to_string).collect()
}

fn path_string(path: impl AsRef<Path>) -> String {
  path.as_ref().to_string_lossy().to_string()
}

/// Key to value map serialized at spawn time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvBuilder {
  vars: BTreeMap<String, EnvValue>,
}

impl EnvBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  /// Start from the current process environment.
  ///
  /// Variables whose name or value is not UTF-8 are left out.
  pub fn inherit() -> Self {
    let vars = std::env::vars_os().filter_map(|(key, value)| {
      let name = key.to_string_lossy().into_owned();
      match (key.into_string(), value.into_string()) {
        (Ok(key), Ok(value)) => Some((key, value)),
        _ => {
          debug!(var = %name, "skipping non UTF-8 variable");
          None
        }
      }
    });
    Self::from_vars(vars)
  }

  pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Self {
    let mut env = Self::new();
    for (key, value) in vars {
      let value = if PATH_VARS.contains(&key.as_str()) {
        EnvValue::Paths(split_paths(&value))
      } else if FLAG_VARS.contains(&key.as_str()) {
        EnvValue::Flags(value.split_whitespace().map(str::to_string).collect())
      } else {
        EnvValue::Plain(value)
      };
      env.vars.insert(key, value);
    }
    env
  }

  pub fn set(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
    self.vars.insert(key.to_string(), EnvValue::Plain(value.into()));
    self
  }

  /// Replace a variable with a flag list.
  pub fn set_flags<I, S>(&mut self, key: &str, flags: I) -> &mut Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let flags = flags.into_iter().map(Into::into).collect();
    self.vars.insert(key.to_string(), EnvValue::Flags(flags));
    self
  }

  pub fn prepend_paths<I, P>(&mut self, key: &str, paths: I) -> &mut Self
  where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
  {
    let mut parts: Vec<String> = paths.into_iter().map(path_string).collect();
    parts.extend(self.take(key).map(EnvValue::into_paths).unwrap_or_default());
    self.vars.insert(key.to_string(), EnvValue::Paths(parts));
    self
  }

  pub fn append_paths<I, P>(&mut self, key: &str, paths: I) -> &mut Self
  where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
  {
    let mut parts = self.take(key).map(EnvValue::into_paths).unwrap_or_default();
    parts.extend(paths.into_iter().map(path_string));
    self.vars.insert(key.to_string(), EnvValue::Paths(parts));
    self
  }

  pub fn prepend_flags<I, S>(&mut self, key: &str, flags: I) -> &mut Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let mut parts: Vec<String> = flags.into_iter().map(Into::into).collect();
    parts.extend(self.take(key).map(EnvValue::into_flags).unwrap_or_default());
    self.vars.insert(key.to_string(), EnvValue::Flags(parts));
    self
  }

  pub fn append_flags<I, S>(&mut self, key: &str, flags: I) -> &mut Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let mut parts = self.take(key).map(EnvValue::into_flags).unwrap_or_default();
    parts.extend(flags.into_iter().map(Into::into));
    self.vars.insert(key.to_string(), EnvValue::Flags(parts));
    self
  }

  pub fn remove(&mut self, key: &str) -> &mut Self {
    self.vars.remove(key);
    self
  }

  fn take(&mut self, key: &str) -> Option<EnvValue> {
    self.vars.remove(key)
  }

  /// Serialized value of one variable.
  pub fn get(&self, key: &str) -> Option<String> {
    self.vars.get(key).map(EnvValue::render)
  }

  /// Serialized variables, sorted by key.
  pub fn to_vars(&self) -> Vec<(String, String)> {
    self.vars.iter().map(|(k, v)| (k.clone(), v.render())).collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sep() -> String {
    PATH_SEPARATOR.to_string()
  }

  #[test]
  fn inherited_path_is_split_and_prepended() {
    let mut env = EnvBuilder::from_vars([("PATH".to_string(), format!("/usr/bin{}/bin", sep()))]);
    env.prepend_paths("PATH", ["/w/INSTALL/bin"]);
    assert_eq!(env.get("PATH").unwrap(), ["/w/INSTALL/bin", "/usr/bin", "/bin"].join(sep().as_str()));
  }

  #[test]
  fn append_to_missing_variable() {
    let mut env = EnvBuilder::new();
    env.append_paths("PKG_CONFIG_PATH", ["/a", "/b"]);
    assert_eq!(env.get("PKG_CONFIG_PATH").unwrap(), format!("/a{}/b", sep()));
  }

  #[test]
  fn flags_join_with_spaces() {
    let mut env = EnvBuilder::from_vars([("CFLAGS".to_string(), "-O2  -g".to_string())]);
    env.append_flags("CFLAGS", ["-fPIC"]);
    env.prepend_flags("CFLAGS", ["--sysroot=/s"]);
    assert_eq!(env.get("CFLAGS").unwrap(), "--sysroot=/s -O2 -g -fPIC");
  }

  #[test]
  fn plain_values_convert_on_demand() {
    let mut env = EnvBuilder::new();
    env.set("LDFLAGS", "-L/x").append_flags("LDFLAGS", ["-L/y"]);
    env.set("CC", "gcc");
    assert_eq!(env.get("LDFLAGS").unwrap(), "-L/x -L/y");
    assert_eq!(
      env.to_vars(),
      vec![
        ("CC".to_string(), "gcc".to_string()),
        ("LDFLAGS".to_string(), "-L/x -L/y".to_string())
      ]
    );
  }

  #[cfg(unix)]
  #[test]
  #[serial_test::serial]
  fn inherit_skips_non_utf8_variables() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let latin1 = OsStr::from_bytes(b"caf\xe9");
    let env = temp_env::with_vars(
      [("CROSSBUILD_LATIN1", Some(latin1)), ("CROSSBUILD_PLAIN", Some(OsStr::new("ok")))],
      EnvBuilder::inherit,
    );

    assert!(env.get("CROSSBUILD_LATIN1").is_none());
    assert_eq!(env.get("CROSSBUILD_PLAIN").as_deref(), Some("ok"));
  }

  #[test]
  fn values_with_spaces_are_not_split_when_plain() {
    let mut env = EnvBuilder::new();
    env.set("MSG", "hello world");
    assert_eq!(env.get("MSG").unwrap(), "hello world");
    env.remove("MSG");
    assert!(env.get("MSG").is_none());
  }
}
