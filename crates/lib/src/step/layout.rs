//! Directory layout of a node and placeholder resolution against it.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::catalogue::{ComponentDef, SourceDef};
use crate::config::active::BuildEnv;
use crate::graph::NodeKey;
use crate::options::BuildOptions;
use crate::placeholder::{NodeField, Placeholder, PlaceholderError, Resolver};
use crate::platform::paths::WorkDirs;

/// Where one node reads its sources, builds and installs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeLayout {
  pub key: NodeKey,
  /// `<name>-<version>`
  pub full_name: String,
  /// Checkout or extraction directory.
  pub source_dir: PathBuf,
  /// `source_dir` plus the recipe's source sub-directory.
  pub build_src_dir: PathBuf,
  pub build_dir: PathBuf,
  pub install_dir: PathBuf,
  pub libprefix: String,
  pub arch: String,
}

impl NodeLayout {
  pub fn compute(key: &NodeKey, def: &ComponentDef, env: &BuildEnv, dirs: &WorkDirs, options: &BuildOptions) -> Self {
    let full_name = def.full_name();

    let source_dir = match &def.source {
      SourceDef::Git { dir, .. } if options.make_release => dirs.source.join(format!("{dir}_release")),
      SourceDef::Git { dir, .. } => dirs.source.join(dir),
      _ if def.is_toolchain() => dirs.toolchain_dir(None, &full_name),
      _ => dirs.source.join(&full_name),
    };
    let build_src_dir = match &def.build.source_subdir {
      Some(subdir) => source_dir.join(subdir),
      None => source_dir.clone(),
    };

    let build_dir = if def.is_toolchain() && !def.is_neutral_toolchain() {
      dirs.toolchain_dir(Some(&key.config), &full_name)
    } else {
      env.build_dir.join(&full_name)
    };

    Self {
      key: key.clone(),
      full_name,
      source_dir,
      build_src_dir,
      build_dir,
      install_dir: env.install_dir.clone(),
      libprefix: env.libprefix.clone(),
      arch: env.arch_name(),
    }
  }

  fn field(&self, field: NodeField) -> &PathBuf {
    match field {
      NodeField::SourceDir => &self.build_src_dir,
      NodeField::BuildDir => &self.build_dir,
      NodeField::InstallDir => &self.install_dir,
    }
  }
}

/// Resolves placeholders for one node; `node:` lookups go to its siblings.
pub struct NodeResolver<'a> {
  pub layout: &'a NodeLayout,
  pub layouts: &'a HashMap<NodeKey, NodeLayout>,
  pub jobs: usize,
}

fn path_string(path: &PathBuf) -> String {
  path.to_string_lossy().to_string()
}

impl Resolver for NodeResolver<'_> {
  fn resolve(&self, placeholder: &Placeholder) -> Result<String, PlaceholderError> {
    let layout = self.layout;
    let value = match placeholder {
      Placeholder::SourceDir => path_string(&layout.build_src_dir),
      Placeholder::BuildDir => path_string(&layout.build_dir),
      Placeholder::InstallDir => path_string(&layout.install_dir),
      Placeholder::Libprefix => layout.libprefix.clone(),
      Placeholder::Config => layout.key.config.clone(),
      Placeholder::Component => layout.key.component.clone(),
      Placeholder::Arch => layout.arch.clone(),
      Placeholder::Jobs => self.jobs.to_string(),
      Placeholder::Node {
        config,
        component,
        field,
      } => {
        let key = NodeKey::new(config.as_str(), component.as_str());
        let sibling = self.layouts.get(&key).ok_or_else(|| PlaceholderError::UnresolvedNode {
          config: config.clone(),
          component: component.clone(),
        })?;
        path_string(sibling.field(*field))
      }
    };
    Ok(value)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::catalogue::Catalogue;
  use crate::config::active::{RunningConfigs, finalize};
  use crate::config::ConfigRegistry;
  use crate::placeholder::substitute;
  use crate::platform::HostEnv;
  use crate::platform::host::HostSystem;
  use tempfile::TempDir;

  fn layout_of(config: &str, component: &str, options: &BuildOptions, temp: &TempDir) -> NodeLayout {
    let host = HostEnv::with(HostSystem::Debian, temp.path(), "lib64");
    let registry = ConfigRegistry::builtin();
    let catalogue = Catalogue::builtin();
    let mut configs = RunningConfigs::new(&registry, &host.system);
    configs.get(config).unwrap();
    let envs = finalize(configs.active(), &catalogue, &host).unwrap();
    let key = NodeKey::new(config, component);
    NodeLayout::compute(
      &key,
      catalogue.get(component).unwrap(),
      envs.get(config).unwrap(),
      &host.dirs,
      options,
    )
  }

  #[test]
  fn archive_component_layout() {
    let temp = TempDir::new().unwrap();
    let layout = layout_of("native_static", "icu4c", &BuildOptions::default(), &temp);
    let root = temp.path();

    assert_eq!(layout.source_dir, root.join("SOURCE/icu4c-73.2"));
    assert_eq!(layout.build_src_dir, root.join("SOURCE/icu4c-73.2/source"));
    assert_eq!(layout.build_dir, root.join("BUILD_native_static/icu4c-73.2"));
    assert_eq!(layout.install_dir, root.join("BUILD_native_static/INSTALL"));
    assert_eq!(layout.libprefix, "lib64");
  }

  #[test]
  fn git_release_uses_release_directory() {
    let temp = TempDir::new().unwrap();
    let options = BuildOptions {
      make_release: true,
      ..Default::default()
    };
    let layout = layout_of("native_dyn", "libzim", &options, &temp);
    assert_eq!(layout.source_dir, temp.path().join("SOURCE/libzim_release"));
  }

  #[test]
  fn toolchains_live_under_toolchains() {
    let temp = TempDir::new().unwrap();
    let layout = layout_of("android_arm", "android-ndk", &BuildOptions::default(), &temp);
    assert_eq!(layout.source_dir, temp.path().join("TOOLCHAINS/android-ndk-r21e"));
    assert_eq!(layout.build_dir, temp.path().join("TOOLCHAINS/android_arm/android-ndk-r21e"));
    assert_eq!(layout.arch, "arm");
  }

  #[test]
  fn resolver_substitutes_own_and_sibling_dirs() {
    let temp = TempDir::new().unwrap();
    let native = layout_of("native_static", "icu4c", &BuildOptions::default(), &temp);
    let own = layout_of("native_dyn", "zlib", &BuildOptions::default(), &temp);
    let layouts: HashMap<NodeKey, NodeLayout> = [(native.key.clone(), native.clone())].into_iter().collect();
    let resolver = NodeResolver {
      layout: &own,
      layouts: &layouts,
      jobs: 8,
    };

    assert_eq!(
      substitute("-j$${jobs} $${config}/$${component}", &resolver).unwrap(),
      "-j8 native_dyn/zlib"
    );
    assert_eq!(
      substitute("$${node:native_static:icu4c:build_dir}", &resolver).unwrap(),
      native.build_dir.to_string_lossy()
    );
    assert!(matches!(
      substitute("$${node:win32_static:icu4c:build_dir}", &resolver),
      Err(PlaceholderError::UnresolvedNode { .. })
    ));
  }
}
