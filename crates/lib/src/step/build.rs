//! Build operations per build method.

use std::path::{Path, PathBuf};

use crate::catalogue::{BuildMethod, ComponentDef, Hook, HookCwd, MergeMode};
use crate::config::Family;
use crate::config::Linkage;
use crate::config::active::{BuildEnv, Overlays};
use crate::consts::{BUILD_DIR_VAR, INSTALL_DIR_VAR, SOURCE_DIR_VAR};
use crate::execute::command::CommandSpec;
use crate::execute::env::EnvBuilder;
use crate::platform::HostEnv;
use crate::platform::tools::{HostTools, ToolKind};

use super::layout::NodeLayout;
use super::operation::{Action, Operation};
use super::{InstantiateError, Planner};

/// Operations of one node's build, bound to its own build directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildStep {
  pub ops: Vec<Operation>,
}

/// Plans the build operations of one node.
pub(crate) struct BuildPlanner<'a> {
  pub def: &'a ComponentDef,
  pub layout: &'a NodeLayout,
  pub env: &'a BuildEnv,
  pub host: &'a HostEnv,
  pub planner: &'a Planner<'a>,
  /// Install directories a merge node combines.
  pub merge_inputs: Vec<PathBuf>,
}

impl BuildPlanner<'_> {
  fn tools(&self) -> &HostTools {
    &self.host.tools
  }

  fn build_dir(&self) -> &Path {
    &self.layout.build_dir
  }

  /// Whether this node compiles for another machine.
  fn cross(&self) -> bool {
    self.env.def.is_cross() && !self.def.force_native_build
  }

  fn is_static(&self) -> bool {
    self.env.def.linkage.is_static()
  }

  fn env(&self, overlays: Overlays) -> EnvBuilder {
    let overlays = if self.def.force_native_build {
      Overlays::NONE
    } else {
      overlays
    };
    self.env.compose(overlays)
  }

  /// Environment of scripts and hooks, which also see the node's directories.
  fn script_env(&self) -> EnvBuilder {
    let mut env = self.env(Overlays::ALL);
    env.set(SOURCE_DIR_VAR, self.layout.build_src_dir.to_string_lossy());
    env.set(BUILD_DIR_VAR, self.layout.build_dir.to_string_lossy());
    env.set(INSTALL_DIR_VAR, self.layout.install_dir.to_string_lossy());
    env
  }

  fn op(&self, name: &str) -> Operation {
    Operation::new(name, self.build_dir())
  }

  fn hook_op(&self, name: &str, hook: Option<&Hook>) -> Result<Option<Operation>, InstantiateError> {
    let Some(hook) = hook else {
      return Ok(None);
    };
    let cwd = match hook.cwd {
      HookCwd::Source => &self.layout.build_src_dir,
      HookCwd::Build => &self.layout.build_dir,
    };
    let spec = self.planner.command(&hook.command, name, cwd, self.script_env())?;
    Ok(Some(self.op(name).run(spec)))
  }

  /// Configure arguments shared by every method: recipe options, then the
  /// static and cross specific ones.
  fn recipe_options(&self) -> Result<Vec<String>, InstantiateError> {
    let build = &self.def.build;
    let mut args = self.planner.sub_all(&build.configure_options)?;
    if self.is_static() {
      args.extend(self.planner.sub_all(&build.static_configure_options)?);
    }
    if self.cross() {
      args.extend(self.planner.sub_all(&build.cross_configure_options)?);
    }
    Ok(args)
  }

  fn install_arg(&self) -> String {
    self.layout.install_dir.to_string_lossy().to_string()
  }

  fn libdir_arg(&self) -> String {
    self
      .layout
      .install_dir
      .join(&self.layout.libprefix)
      .to_string_lossy()
      .to_string()
  }

  /// `pre_build_script`, `configure`, `post_configure_script`, `compile`,
  /// `test`, `install`, `post_build_script`, dropping the ones a method lacks.
  pub fn ops(&self) -> Result<BuildStep, InstantiateError> {
    let build = &self.def.build;
    let mut ops = Vec::new();
    ops.extend(self.hook_op("pre_build_script", build.pre_build.as_ref())?);

    match &build.method {
      BuildMethod::Noop => {}
      BuildMethod::Make {
        configure_script,
        linkage_flags,
      } => {
        ops.push(self.make_configure(configure_script, *linkage_flags)?);
        ops.extend(self.hook_op("post_configure_script", build.post_configure.as_ref())?);
        ops.push(self.make_compile());
        ops.push(self.make_install());
      }
      BuildMethod::CMake => {
        ops.push(self.cmake_configure()?);
        ops.extend(self.hook_op("post_configure_script", build.post_configure.as_ref())?);
        ops.push(self.make_compile());
        ops.push(self.make_install());
      }
      BuildMethod::Meson => {
        ops.push(self.meson_configure()?);
        ops.extend(self.hook_op("post_configure_script", build.post_configure.as_ref())?);
        ops.push(
          self
            .op("compile")
            .run(self.ninja(["-v"]).env(self.env(Overlays::ALL))),
        );
        ops.push(self.meson_test());
        ops.push(
          self
            .op("install")
            .run(self.ninja(["-v", "install"]).env(self.env(Overlays::ALL))),
        );
      }
      BuildMethod::Gradle { targets } => {
        ops.push(self.op("configure").action(Action::CopyTree {
          from: self.layout.build_src_dir.clone(),
          to: self.layout.build_dir.clone(),
        }));
        ops.extend(self.hook_op("post_configure_script", build.post_configure.as_ref())?);
        let targets = self.planner.sub_all(targets)?;
        ops.push(
          self.op("compile").run(
            CommandSpec::new(self.tools().program(ToolKind::Gradle), self.build_dir())
              .args(targets)
              .args(["-i", "--no-daemon", "--build-cache"])
              .env(self.env(Overlays::ALL)),
          ),
        );
      }
      BuildMethod::Script {
        configure,
        compile,
        test,
        install,
      } => {
        if let Some(argv) = configure {
          ops.push(self.script_op("configure", argv)?);
        }
        ops.extend(self.hook_op("post_configure_script", build.post_configure.as_ref())?);
        for (name, phase) in [("compile", compile), ("test", test), ("install", install)] {
          if let Some(argv) = phase {
            ops.push(self.script_op(name, argv)?);
          }
        }
      }
      BuildMethod::MergeLibs { mode } => ops.extend(self.merge_ops(*mode)),
    }

    ops.extend(self.hook_op("post_build_script", build.post_build.as_ref())?);
    Ok(BuildStep { ops })
  }

  /// `pre_build_script`, `configure`, `make_dist`, for distribution archives.
  pub fn dist_ops(&self) -> Result<BuildStep, InstantiateError> {
    let build = &self.def.build;
    let mut ops = Vec::new();
    ops.extend(self.hook_op("pre_build_script", build.pre_build.as_ref())?);

    let dist = match &build.method {
      BuildMethod::Make {
        configure_script,
        linkage_flags,
      } => {
        ops.push(self.make_configure(configure_script, *linkage_flags)?);
        self.op("make_dist").run(self.make(["dist"]).env(self.env(Overlays::ALL)))
      }
      BuildMethod::Meson => {
        ops.push(self.meson_configure()?);
        self
          .op("make_dist")
          .run(self.ninja(["-v", "dist"]).env(self.env(Overlays::ALL)))
      }
      other => self
        .op("make_dist")
        .action(Action::Skip(format!("No dist for {} builds", other.kind()))),
    };
    ops.push(dist);
    Ok(BuildStep { ops })
  }

  fn make<I: IntoIterator<Item = S>, S: Into<String>>(&self, args: I) -> CommandSpec {
    CommandSpec::new(self.tools().program(ToolKind::Make), self.build_dir()).args(args)
  }

  fn ninja<I: IntoIterator<Item = S>, S: Into<String>>(&self, args: I) -> CommandSpec {
    CommandSpec::new(self.tools().program(ToolKind::Ninja), self.build_dir()).args(args)
  }

  fn make_configure(&self, configure_script: &str, linkage_flags: bool) -> Result<Operation, InstantiateError> {
    let program = self.planner.sub(configure_script)?;
    let mut args = self.recipe_options()?;
    if linkage_flags {
      let flags: &[&str] = match self.env.def.linkage {
        Linkage::Static => &["--enable-static", "--disable-shared"],
        Linkage::Dynamic | Linkage::Mixed { .. } => &["--enable-shared", "--disable-static"],
        Linkage::Neutral => &[],
      };
      args.extend(flags.iter().map(|f| f.to_string()));
    }
    if !self.def.force_native_build {
      args.extend(self.env.def.configure_options.iter().cloned());
    }
    args.push(format!("--prefix={}", self.install_arg()));
    args.push(format!("--libdir={}", self.libdir_arg()));

    Ok(
      self.op("configure").run(
        CommandSpec::new(program, self.build_dir())
          .args(args)
          .env(self.env(Overlays::ALL)),
      ),
    )
  }

  fn make_compile(&self) -> Operation {
    self.op("compile").run(
      self
        .make([format!("-j{}", self.planner.jobs())])
        .env(self.env(Overlays::ALL)),
    )
  }

  fn make_install(&self) -> Operation {
    self
      .op("install")
      .run(self.make(["install"]).env(self.env(Overlays::ALL)))
  }

  fn cmake_configure(&self) -> Result<Operation, InstantiateError> {
    let mut args = self.recipe_options()?;
    args.push("-DCMAKE_VERBOSE_MAKEFILE:BOOL=ON".to_string());
    args.push(format!("-DCMAKE_INSTALL_PREFIX:PATH={}", self.install_arg()));
    args.push(format!("-DCMAKE_INSTALL_LIBDIR:PATH={}", self.layout.libprefix));
    args.push(self.layout.build_src_dir.to_string_lossy().to_string());
    if self.cross()
      && let Some(crossfile) = &self.env.cmake_crossfile
    {
      args.push(format!("-DCMAKE_TOOLCHAIN_FILE={}", crossfile.display()));
    }

    Ok(
      self.op("configure").run(
        CommandSpec::new(self.tools().program(ToolKind::CMake), self.build_dir())
          .args(args)
          .env(self.env(Overlays::CROSS_ENV_ONLY)),
      ),
    )
  }

  fn meson_configure(&self) -> Result<Operation, InstantiateError> {
    let library = if self.is_static() { "static" } else { "shared" };
    let mut args = vec![
      "setup".to_string(),
      self.layout.build_dir.to_string_lossy().to_string(),
      format!("--default-library={library}"),
    ];
    args.extend(self.recipe_options()?);
    args.push(format!("--prefix={}", self.install_arg()));
    args.push(format!("--libdir={}", self.layout.libprefix));
    if self.cross()
      && let Some(crossfile) = &self.env.meson_crossfile
    {
      args.push(format!("--cross-file={}", crossfile.display()));
    }

    Ok(
      self
        .op("configure")
        .action(Action::ResetDir(self.layout.build_dir.clone()))
        .run(
          CommandSpec::new(self.tools().program(ToolKind::Meson), &self.layout.build_src_dir)
            .args(args)
            .env(self.env(Overlays::CROSS_ENV_ONLY)),
        ),
    )
  }

  fn meson_test(&self) -> Operation {
    let op = self.op("test");
    if self.env.def.family == Family::Android {
      return op.action(Action::Skip("No test for android".to_string()));
    }
    // Follows the configuration, even for force-native nodes.
    if self.env.def.is_cross() && !self.is_static() {
      return op.action(Action::Skip("Cross-compiled dynamic build".to_string()));
    }
    op.run(
      CommandSpec::new(self.tools().program(ToolKind::Meson), self.build_dir())
        .args(["test", "--verbose"])
        .env(self.env(Overlays::ALL)),
    )
  }

  fn script_op(&self, name: &str, argv: &[String]) -> Result<Operation, InstantiateError> {
    let spec = self.planner.command(argv, name, self.build_dir(), self.script_env())?;
    Ok(self.op(name).run(spec))
  }

  fn merge_ops(&self, mode: MergeMode) -> Vec<Operation> {
    let mut ops = Vec::new();
    let program = match mode {
      MergeMode::Lipo => {
        if let Some(first) = self.merge_inputs.first() {
          ops.push(self.op("copy_headers").action(Action::CopyTree {
            from: first.join("include"),
            to: self.layout.install_dir.join("include"),
          }));
        }
        self.tools().program(ToolKind::Lipo)
      }
      MergeMode::XcFramework => self.tools().program(ToolKind::Xcodebuild),
    };
    ops.push(self.op("merge_libs").action(Action::MergeLibs {
      inputs: self.merge_inputs.clone(),
      output: self.layout.install_dir.clone(),
      libdir: self.layout.libprefix.clone(),
      mode,
      program,
      env: self.env(Overlays::NONE),
    }));
    ops
  }
}
