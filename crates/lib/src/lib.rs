//! crossbuild-lib: dependency resolution and build orchestration for cross builds.
//!
//! The crate is organised leaves first:
//! - `platform`: host probe (distribution, tools, library prefix, working tree)
//! - `catalogue`: component recipes and their registry
//! - `config`: build configurations, running configurations and cross environments
//! - `graph`: resolution of a requested `(config, component)` into an ordered node list
//! - `step`: per-node source and build operations
//! - `execute`: the sequential engine with completion markers
//! - `packages`: short-circuiting nodes satisfied by host packages
//! - `builder`: the orchestrator tying the phases together

pub mod builder;
pub mod catalogue;
pub mod config;
pub mod consts;
pub mod context;
pub mod execute;
pub mod graph;
pub mod options;
pub mod packages;
pub mod placeholder;
pub mod platform;
pub mod step;
pub mod util;
