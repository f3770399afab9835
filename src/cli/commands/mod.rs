//! Command implementations.

pub mod init;
pub mod list;
pub mod sync;
pub mod validate;
pub mod version;

use std::path::{Path, PathBuf};

use crate::config::{self, Config};
use crate::error::Result;

/// Load the configuration for a command: resolve the path, parse the
/// file, then apply credential overrides from the environment.
pub(crate) fn load_config(explicit: Option<&Path>) -> Result<(Config, PathBuf)> {
    let path = config::resolve_config_path(explicit);
    let mut cfg = Config::load(&path)?;
    cfg.apply_env_overrides();
    Ok((cfg, path))
}
