//! Implementation of the `xb list` command.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::ValueEnum;
use serde_json::json;

use crossbuild_lib::config::types::ConfigKind;

use super::{base_options, load_context};
use crate::output::{OutputFormat, print_json, symbols};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ListKind {
  /// Component recipes
  Components,
  /// Build configurations
  Configs,
}

pub fn cmd_list(kind: ListKind, working_dir: &Path, catalogue: Option<&PathBuf>, output: OutputFormat) -> Result<()> {
  let ctx = load_context(base_options(working_dir)?, catalogue)?;

  match kind {
    ListKind::Components => {
      if output.is_json() {
        let items: Vec<_> = ctx
          .catalogue
          .iter()
          .map(|def| {
            json!({
              "name": def.name,
              "version": def.version,
              "method": def.build.method.kind(),
              "deps": def.deps.iter().map(ToString::to_string).collect::<Vec<_>>(),
              "toolchain": def.is_toolchain(),
            })
          })
          .collect();
        return print_json(&items);
      }
      for def in ctx.catalogue.iter() {
        let deps: Vec<String> = def.deps.iter().map(ToString::to_string).collect();
        let mut line = format!("{} {} [{}]", symbols::INFO, def.full_name(), def.build.method.kind());
        if !deps.is_empty() {
          line.push_str(&format!(" {} {}", symbols::ARROW, deps.join(", ")));
        }
        println!("{line}");
      }
    }
    ListKind::Configs => {
      if output.is_json() {
        let items: Vec<_> = ctx
          .configs
          .iter()
          .map(|def| {
            json!({
              "name": def.name,
              "family": def.family.to_string(),
              "linkage": def.linkage.as_str(),
              "meta": matches!(def.kind, ConfigKind::Meta { .. }),
              "cross": def.is_cross(),
              "hosts": def.compatible_hosts.iter().map(|h| h.as_str().to_string()).collect::<Vec<_>>(),
            })
          })
          .collect();
        return print_json(&items);
      }
      for def in ctx.configs.iter() {
        let mut traits = vec![def.family.to_string(), def.linkage.as_str().to_string()];
        if matches!(def.kind, ConfigKind::Meta { .. }) {
          traits.push("meta".to_string());
        }
        if def.is_cross() {
          traits.push("cross".to_string());
        }
        println!("{} {} ({})", symbols::INFO, def.name, traits.join(", "));
      }
    }
  }
  Ok(())
}
