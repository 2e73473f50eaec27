//! Source acquisition operations.

use std::path::{Path, PathBuf};

use crate::catalogue::{ComponentDef, Hook, SourceDef};
use crate::execute::command::CommandSpec;
use crate::execute::env::EnvBuilder;
use crate::execute::marker::Marker;
use crate::options::BuildOptions;
use crate::platform::HostEnv;
use crate::platform::tools::ToolKind;

use super::layout::NodeLayout;
use super::operation::{Action, Operation};
use super::{InstantiateError, Planner};

/// Operations bringing a component's sources into its source directory.
///
/// Shared between every node building the same sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceStep {
  pub component: String,
  pub source_dir: PathBuf,
  pub ops: Vec<Operation>,
}

impl SourceStep {
  pub(crate) fn plan(
    def: &ComponentDef,
    layout: &NodeLayout,
    planner: &Planner<'_>,
    host: &HostEnv,
    options: &BuildOptions,
  ) -> Result<Self, InstantiateError> {
    let source_dir = layout.source_dir.clone();
    let env = EnvBuilder::inherit();
    let mut ops = Vec::new();

    match &def.source {
      SourceDef::Archive {
        archive,
        top_dir,
        patches,
        post_prepare,
      } => {
        let archive_path = host.dirs.archive.join(&archive.name);
        ops.push(
          Operation::unmarked("download")
            .with_marker(Marker::with_extra(&host.dirs.archive, "download", &def.name))
            .action(Action::Download {
              url: archive.url(&options.remote_prefix),
              sha256: archive.sha256.clone(),
              dest: archive_path.clone(),
            }),
        );
        ops.push(Operation::new("extract", &source_dir).action(Action::Extract {
          archive: archive_path,
          dest: source_dir.clone(),
          top_dir: top_dir.clone(),
          tar: host.tools.program(ToolKind::Tar),
        }));
        if !patches.is_empty() {
          let patch = host.tools.program(ToolKind::Patch);
          let specs = patches
            .iter()
            .map(|name| {
              CommandSpec::new(&patch, &source_dir)
                .arg("-p1")
                .stdin(options.patches_dir.join(name))
                .env(env.clone())
            })
            .collect();
          ops.push(Operation::new("patch", &source_dir).action(Action::Run(specs)));
        }
        if let Some(hook) = post_prepare {
          ops.push(post_prepare_op(hook, &source_dir, planner, &env)?);
        }
      }
      SourceDef::Git {
        remote,
        dir,
        base_ref,
        release_ref,
        post_prepare,
      } => {
        let git_ref = match release_ref {
          Some(release) if options.make_release => release,
          _ => base_ref,
        };
        let git = host.tools.program(ToolKind::Git);
        let dir_name = source_dir
          .file_name()
          .map(|n| n.to_string_lossy().to_string())
          .unwrap_or_else(|| dir.clone());

        ops.push(
          Operation::unmarked("gitclone").skip_if_exists(&source_dir).run(
            CommandSpec::new(&git, &host.dirs.source)
              .args(["clone", "--depth=1", "--branch", git_ref.as_str(), remote.as_str(), dir_name.as_str()])
              .env(env.clone()),
          ),
        );
        ops.push(Operation::new("gitupdate", &source_dir).action(Action::Run(vec![
          CommandSpec::new(&git, &source_dir)
            .args(["fetch", "origin", git_ref.as_str()])
            .env(env.clone()),
          CommandSpec::new(&git, &source_dir)
            .args(["checkout", git_ref.as_str()])
            .env(env.clone()),
        ])));
        if let Some(hook) = post_prepare {
          ops.push(post_prepare_op(hook, &source_dir, planner, &env)?);
        }
      }
      SourceDef::Noop => {}
    }

    Ok(Self {
      component: def.name.clone(),
      source_dir,
      ops,
    })
  }
}

/// Post-prepare hooks always run at the top of the checkout.
fn post_prepare_op(
  hook: &Hook,
  source_dir: &Path,
  planner: &Planner<'_>,
  env: &EnvBuilder,
) -> Result<Operation, InstantiateError> {
  let spec = planner.command(&hook.command, "post_prepare_script", source_dir, env.clone())?;
  Ok(Operation::new("post_prepare_script", source_dir).run(spec))
}
