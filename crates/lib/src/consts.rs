use std::time::Duration;

pub const APP_NAME: &str = "crossbuild";

/// Shared source checkouts and extracted archives.
pub const SOURCE_DIR: &str = "SOURCE";
/// Downloaded archives.
pub const ARCHIVE_DIR: &str = "ARCHIVE";
pub const TOOLCHAINS_DIR: &str = "TOOLCHAINS";
pub const LOGS_DIR: &str = "LOGS";
/// Per-configuration build directories are named `BUILD_<config>`.
pub const BUILD_DIR_PREFIX: &str = "BUILD_";
pub const INSTALL_DIR: &str = "INSTALL";

pub const MARKER_SUFFIX: &str = "_ok";
pub const PACKAGES_MARKER: &str = ".install_packages_ok";

pub const NEUTRAL_CONFIG: &str = "neutral";

pub const DEFAULT_REMOTE_PREFIX: &str = "http://mirror.download.kiwix.org/dev/kiwix-build/";
pub const DEFAULT_JOBS: usize = 4;

/// Interval between liveness dots while a subprocess is running.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

pub const HOST_ENV_VAR: &str = "CROSSBUILD_HOST";
pub const REMOTE_PREFIX_ENV_VAR: &str = "CROSSBUILD_REMOTE_PREFIX";

pub const SOURCE_DIR_VAR: &str = "CROSSBUILD_SOURCE_DIR";
pub const BUILD_DIR_VAR: &str = "CROSSBUILD_BUILD_DIR";
pub const INSTALL_DIR_VAR: &str = "CROSSBUILD_INSTALL_DIR";

#[cfg(windows)]
pub const PATH_SEPARATOR: char = ';';
#[cfg(not(windows))]
pub const PATH_SEPARATOR: char = ':';
