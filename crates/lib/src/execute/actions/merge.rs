//! Library merging across the install trees of several configurations.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::catalogue::MergeMode;
use crate::execute::command::CommandSpec;
use crate::execute::env::EnvBuilder;
use crate::execute::types::StepError;

/// Inputs of one merge action.
#[derive(Debug, Clone, Copy)]
pub struct MergeRequest<'a> {
  pub inputs: &'a [PathBuf],
  pub output: &'a Path,
  pub libdir: &'a str,
  pub mode: MergeMode,
  pub program: &'a str,
  pub env: &'a EnvBuilder,
}

fn is_library(name: &str, mode: MergeMode) -> bool {
  match mode {
    MergeMode::Lipo => name.ends_with(".a") || name.ends_with(".dylib"),
    MergeMode::XcFramework => name.ends_with(".a"),
  }
}

/// Library file names of the first input, symbolic links excluded.
fn library_names(libdir: &Path, mode: MergeMode) -> Result<Vec<String>, StepError> {
  let mut names = Vec::new();
  for entry in fs::read_dir(libdir).map_err(|e| StepError::io(libdir, e))? {
    let entry = entry.map_err(|e| StepError::io(libdir, e))?;
    let file_type = entry.file_type().map_err(|e| StepError::io(entry.path(), e))?;
    let name = entry.file_name().to_string_lossy().to_string();
    if file_type.is_file() && is_library(&name, mode) {
      names.push(name);
    }
  }
  names.sort();
  Ok(names)
}

/// Prepare the output tree and list the commands producing merged libraries.
///
/// Lipo mode makes one fat library per name found in the first input. The
/// xcframework mode makes one `.xcframework` per static library, replacing a
/// previous one since `xcodebuild` refuses to overwrite.
pub fn merge_commands(request: &MergeRequest<'_>) -> Result<Vec<CommandSpec>, StepError> {
  let Some(first) = request.inputs.first() else {
    return Ok(Vec::new());
  };
  let out_libdir = request.output.join(request.libdir);
  fs::create_dir_all(&out_libdir).map_err(|e| StepError::io(&out_libdir, e))?;

  let names = library_names(&first.join(request.libdir), request.mode)?;
  debug!(count = names.len(), mode = ?request.mode, "merging libraries");

  let mut commands = Vec::new();
  for name in names {
    let present: Vec<PathBuf> = request
      .inputs
      .iter()
      .map(|input| input.join(request.libdir).join(&name))
      .filter(|path| path.is_file())
      .collect();

    let spec = CommandSpec::new(request.program, request.output).env(request.env.clone());
    let spec = match request.mode {
      MergeMode::Lipo => spec
        .arg("-create")
        .args(present.iter().map(|p| p.to_string_lossy().to_string()))
        .arg("-output")
        .arg(out_libdir.join(&name).to_string_lossy()),
      MergeMode::XcFramework => {
        let stem = name.trim_end_matches(".a");
        let framework = out_libdir.join(format!("{stem}.xcframework"));
        if framework.exists() {
          fs::remove_dir_all(&framework).map_err(|e| StepError::io(&framework, e))?;
        }
        let mut spec = spec.arg("-create-xcframework");
        for library in &present {
          spec = spec.arg("-library").arg(library.to_string_lossy());
        }
        spec.arg("-output").arg(framework.to_string_lossy())
      }
    };
    commands.push(spec);
  }
  Ok(commands)
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  fn install_tree(root: &Path, libs: &[&str]) -> PathBuf {
    let lib = root.join("lib");
    fs::create_dir_all(&lib).unwrap();
    for name in libs {
      fs::write(lib.join(name), "").unwrap();
    }
    root.to_path_buf()
  }

  #[test]
  fn lipo_merges_each_library_of_first_input() {
    let temp = TempDir::new().unwrap();
    let arm = install_tree(&temp.path().join("BUILD_ios_arm64/INSTALL"), &["libzim.a", "libzstd.a", "zim.pc"]);
    let sim = install_tree(&temp.path().join("BUILD_iossimulator_x86_64/INSTALL"), &["libzim.a"]);
    let output = temp.path().join("BUILD_ios_multi/INSTALL");
    let env = EnvBuilder::new();
    let inputs = vec![arm.clone(), sim.clone()];

    let commands = merge_commands(&MergeRequest {
      inputs: &inputs,
      output: &output,
      libdir: "lib",
      mode: MergeMode::Lipo,
      program: "lipo",
      env: &env,
    })
    .unwrap();

    assert_eq!(commands.len(), 2);
    assert_eq!(
      commands[0].args,
      vec![
        "-create".to_string(),
        arm.join("lib/libzim.a").to_string_lossy().to_string(),
        sim.join("lib/libzim.a").to_string_lossy().to_string(),
        "-output".to_string(),
        output.join("lib/libzim.a").to_string_lossy().to_string(),
      ]
    );
    assert_eq!(commands[1].args.len(), 4);
    assert!(output.join("lib").is_dir());
  }

  #[test]
  fn xcframework_replaces_previous_output() {
    let temp = TempDir::new().unwrap();
    let mac = install_tree(&temp.path().join("mac"), &["libzim.a", "libzim.dylib"]);
    let output = temp.path().join("out");
    fs::create_dir_all(output.join("lib/libzim.xcframework")).unwrap();
    let env = EnvBuilder::new();
    let inputs = vec![mac];

    let commands = merge_commands(&MergeRequest {
      inputs: &inputs,
      output: &output,
      libdir: "lib",
      mode: MergeMode::XcFramework,
      program: "xcodebuild",
      env: &env,
    })
    .unwrap();

    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].args[0], "-create-xcframework");
    assert!(commands[0].args.last().unwrap().ends_with("libzim.xcframework"));
    assert!(!output.join("lib/libzim.xcframework").exists());
  }

  #[test]
  fn no_inputs_means_nothing_to_do() {
    let temp = TempDir::new().unwrap();
    let env = EnvBuilder::new();
    let commands = merge_commands(&MergeRequest {
      inputs: &[],
      output: temp.path(),
      libdir: "lib",
      mode: MergeMode::Lipo,
      program: "lipo",
      env: &env,
    })
    .unwrap();
    assert!(commands.is_empty());
  }
}
