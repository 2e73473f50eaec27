//! The context object passed to every phase of a run.

use crate::catalogue::Catalogue;
use crate::config::ConfigRegistry;
use crate::options::BuildOptions;
use crate::platform::HostEnv;

/// Read-only inputs of a run, built once at start-up.
#[derive(Debug, Clone)]
pub struct BuildContext {
  pub options: BuildOptions,
  pub host: HostEnv,
  pub catalogue: Catalogue,
  pub configs: ConfigRegistry,
}

impl BuildContext {
  pub fn new(options: BuildOptions, host: HostEnv, catalogue: Catalogue, configs: ConfigRegistry) -> Self {
    Self {
      options,
      host,
      catalogue,
      configs,
    }
  }

  /// Context with the builtin catalogue and configurations.
  pub fn builtin(options: BuildOptions, host: HostEnv) -> Self {
    Self::new(options, host, Catalogue::builtin(), ConfigRegistry::builtin())
  }
}
