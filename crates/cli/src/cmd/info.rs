//! Implementation of the `xb info` command: what the host probe found.

use std::path::Path;

use anyhow::Result;

use crossbuild_lib::platform::HostEnv;

use super::base_options;
use crate::output::{OutputFormat, print_json, print_stat, print_warning};

pub fn cmd_info(working_dir: &Path, output: OutputFormat) -> Result<()> {
  let options = base_options(working_dir)?;
  let host = HostEnv::probe(&options);
  let platform = host.platform.as_ref().map(|p| p.triple());

  if output.is_json() {
    let tools: serde_json::Map<String, serde_json::Value> = host
      .tools
      .iter()
      .map(|(kind, path)| {
        let value = path.map_or(serde_json::Value::Null, |p| p.display().to_string().into());
        (kind.name().to_string(), value)
      })
      .collect();
    return print_json(&serde_json::json!({
      "platform": platform,
      "host": host.system.as_str(),
      "libprefix": host.libprefix,
      "ccache_dir": host.ccache_dir.as_ref().map(|p| p.display().to_string()),
      "working_dir": host.dirs.root.display().to_string(),
      "tools": tools,
    }));
  }

  println!("System:");
  match &platform {
    Some(triple) => print_stat("Platform", triple),
    None => print_warning("Could not detect platform."),
  }
  print_stat("Host", host.system.as_str());
  print_stat("Libprefix", &host.libprefix);
  if let Some(dir) = &host.ccache_dir {
    print_stat("Ccache", &dir.display().to_string());
  }
  print_stat("Working dir", &host.dirs.root.display().to_string());

  println!();
  println!("Tools:");
  for (kind, path) in host.tools.iter() {
    let found = path.map_or_else(|| "not found".to_string(), |p| p.display().to_string());
    print_stat(kind.name(), &found);
  }
  Ok(())
}
