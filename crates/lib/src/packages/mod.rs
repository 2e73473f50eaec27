//! Host package short-circuit.
//!
//! Before anything runs, nodes a host package can stand in for are taken out
//! of the executable set, and the packages they map to are installed in one
//! batch. Removal happens after ordering, so the remaining order is kept.

pub mod manager;
pub mod mapper;

use std::collections::BTreeSet;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::consts::PACKAGES_MARKER;
use crate::context::BuildContext;
use crate::execute::progress::Progress;
use crate::execute::types::OpOutcome;
use crate::graph::{NodeKey, Resolution};

pub use manager::{HostPackages, PackageManager, PackageTool};
pub use mapper::PackageMapper;

#[derive(Debug, Error)]
pub enum PackageError {
  #[error("no package manager known for this host")]
  UnsupportedHost,

  #[error("cannot run '{command}': {source}")]
  Spawn {
    command: String,
    #[source]
    source: std::io::Error,
  },

  #[error("'{command}' failed with exit code {code:?}")]
  InstallFailed { command: String, code: Option<i32> },

  #[error("io error on {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

impl PackageError {
  pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    Self::Io {
      path: path.into(),
      source,
    }
  }
}

/// What the package phase did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageReport {
  /// Nodes satisfied by host packages.
  pub satisfied: BTreeSet<NodeKey>,
  /// Outcome per configuration, in activation order.
  pub configs: Vec<(String, OpOutcome)>,
  /// Packages handed to the package manager.
  pub installed: Vec<String>,
}

/// Packages needed by the nodes of `config`, and the nodes they satisfy.
fn collect(ctx: &BuildContext, resolution: &Resolution, mapper: &PackageMapper, config: &str) -> (Vec<String>, Vec<NodeKey>) {
  let mut packages: Vec<String> = mapper.common().to_vec();
  let mut satisfied = Vec::new();
  let nodes: Vec<&NodeKey> = resolution.order.iter().filter(|key| key.config == config).collect();

  for key in &nodes {
    if let Some(mapped) = mapper.packages(&key.component) {
      packages.extend(mapped.iter().cloned());
      satisfied.push((*key).clone());
    }
  }
  for key in &nodes {
    let Ok(def) = ctx.catalogue.get(&key.component) else {
      continue;
    };
    for extra in &def.extra_packages {
      packages.extend(mapper.packages(extra).unwrap_or_default().iter().cloned());
    }
  }

  let mut seen = BTreeSet::new();
  packages.retain(|package| seen.insert(package.clone()));
  (packages, satisfied)
}

/// Run the package phase for every configuration of `resolution`.
pub async fn install_packages<M: PackageManager>(
  ctx: &BuildContext,
  resolution: &Resolution,
  manager: &M,
  progress: &dyn Progress,
) -> Result<PackageReport, PackageError> {
  let options = &ctx.options;
  let mut report = PackageReport::default();

  for config in &resolution.configs {
    let Some(mapper) = PackageMapper::lookup(&ctx.host.system, config) else {
      let message = format!(
        "We don't know which packages we must install to compile {config} on a {} host.",
        ctx.host.system
      );
      warn!(config = %config, host = %ctx.host.system, "no package table");
      report.configs.push((config.clone(), OpOutcome::Warning(message)));
      continue;
    };

    let (packages, satisfied) = collect(ctx, resolution, &mapper, config);
    debug!(mapper = mapper.key(), packages = ?packages, satisfied = ?satisfied, "package table");
    report.satisfied.extend(satisfied);

    if options.dont_install_packages {
      report
        .configs
        .push((config.clone(), OpOutcome::Skipped(Some("packages assumed installed".to_string()))));
      continue;
    }

    let build_dir = ctx.host.dirs.build_dir(config);
    let autoskip = build_dir.join(PACKAGES_MARKER);
    if autoskip.is_file() && !options.force_install_packages {
      report.configs.push((config.clone(), OpOutcome::Cached));
      continue;
    }

    let mut needed = Vec::new();
    for package in &packages {
      let installed = manager.is_installed(package).await?;
      progress.message(&format!(" - {package} : {}", if installed { "SKIP" } else { "NEEDED" }));
      if !installed {
        needed.push(package.clone());
      }
    }

    if needed.is_empty() {
      progress.message("SKIP, No package to install.");
    } else {
      info!(config = %config, packages = ?needed, "installing host packages");
      manager.install(&needed).await?;
      report.installed.extend(needed);
    }

    std::fs::create_dir_all(&build_dir).map_err(|e| PackageError::io(&build_dir, e))?;
    std::fs::write(&autoskip, b"").map_err(|e| PackageError::io(&autoskip, e))?;
    report.configs.push((config.clone(), OpOutcome::Done));
  }

  Ok(report)
}
