use predicates::prelude::*;
use serde_json::json;

use crate::common::{TestEnv, exists, script_component};

fn tools_env() -> TestEnv {
  TestEnv::with_components(vec![
    script_component("core", &[]),
    script_component("util", &[]),
    script_component("tools", &["core", "util"]),
  ])
}

#[test]
fn build_runs_every_phase_in_dependency_order() {
  let env = tools_env();
  env
    .build("tools")
    .assert()
    .success()
    .stdout(predicate::str::contains("[BUILD]"))
    .stdout(predicate::str::contains("build tools (native_dyn):"));

  let journal = env.journal("native_dyn");
  assert_eq!(journal.len(), 9);
  let pos = |line: &str| journal.iter().position(|l| l == line).unwrap();
  assert!(pos("core:install") < pos("tools:configure"));
  assert!(pos("util:install") < pos("tools:configure"));
  assert!(env.marker("native_dyn", "tools", "install").is_file());
}

#[test]
fn second_build_runs_nothing() {
  let env = tools_env();
  env.build("tools").assert().success();
  env.clear_journal("native_dyn");

  env.build("tools").assert().success();
  assert!(env.journal("native_dyn").is_empty());
}

#[test]
fn deleted_marker_rebuilds_downstream_only() {
  let env = tools_env();
  env.build("tools").assert().success();
  env.clear_journal("native_dyn");
  std::fs::remove_file(env.marker("native_dyn", "core", "compile")).unwrap();

  env.build("tools").assert().success();
  assert_eq!(
    env.journal("native_dyn"),
    vec![
      "core:compile",
      "core:install",
      "tools:configure",
      "tools:compile",
      "tools:install",
    ]
  );
}

#[test]
fn failing_tool_stops_the_build() {
  let env = TestEnv::with_components(vec![
    json!({
      "name": "core",
      "build": {
        "method": "script",
        "compile": ["sh", "-c", "echo compiler exploded; exit 3"],
      }
    }),
    script_component("tools", &["core"]),
  ]);

  env
    .build("tools")
    .assert()
    .failure()
    .stderr(predicate::str::contains("compiler exploded"))
    .stderr(predicate::str::contains("Stopping build due to errors"));
  assert!(env.journal("native_dyn").is_empty());
  assert!(!exists(&env.marker("native_dyn", "core", "compile")));

  let log = env.working_dir().join("LOGS").join("cmd_compile_core.log");
  let content = std::fs::read_to_string(log).unwrap();
  assert!(content.contains("sh -c"));
}

#[test]
fn nodeps_builds_only_the_target() {
  let env = tools_env();
  env.build("tools").arg("--build-nodeps").assert().success();

  let journal = env.journal("native_dyn");
  assert!(journal.iter().all(|line| line.starts_with("tools:")));
  assert_eq!(journal.len(), 3);
}

#[test]
fn clean_at_end_keeps_install() {
  let env = tools_env();
  env.build("tools").arg("--clean-at-end").assert().success();

  let build_dir = env.build_dir("native_dyn");
  assert!(!build_dir.join("tools").exists());
  assert!(!build_dir.join("journal").exists());
}

#[test]
fn unknown_dependency_fails_before_running() {
  let env = TestEnv::with_components(vec![script_component("tools", &["missing"])]);

  env
    .build("tools")
    .assert()
    .failure()
    .stderr(predicate::str::contains("unknown component: missing"));
  assert!(env.journal("native_dyn").is_empty());
}
