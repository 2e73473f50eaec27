//! End-to-end builds through the xb binary, with shell scripts standing in
//! for real build systems.

mod build_tests;
mod common;
