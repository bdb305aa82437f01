//! Layered configuration loading for the coreward core-arbitration service.
//!
//! Sources are merged with the following precedence, highest first:
//! 1. CLI arguments (applied by the caller after [`CorewardConfig::load`])
//! 2. `COREWARD_*` environment variables
//! 3. `coreward.toml` in the project directory
//! 4. `~/.config/coreward/config.toml`
//! 5. built-in defaults

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CorewardConfig {
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Overrides the host's detected physical core count. `None` means
    /// "ask `core_affinity` at startup".
    pub max_cores: Option<u32>,
    pub socket_dir: PathBuf,
    pub queue_capacity: usize,
    pub verbosity: i32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_cores: None,
            socket_dir: PathBuf::from(".coreward/sockets"),
            queue_capacity: 256,
            verbosity: 0,
        }
    }
}

impl CorewardConfig {
    pub fn load() -> Result<Self, ConfigError> {
        ConfigLoader::new().load()
    }

    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Resolves a relative `socket_dir` against `base_dir`. No-op if it
    /// is already absolute (e.g. set explicitly via `--socket-dir`).
    pub fn resolve_paths(&mut self, base_dir: impl AsRef<Path>) {
        if self.server.socket_dir.is_relative() {
            self.server.socket_dir = base_dir.as_ref().join(&self.server.socket_dir);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_queue_capacity() {
        let config = CorewardConfig::default();
        assert_eq!(config.server.queue_capacity, 256);
        assert!(config.server.max_cores.is_none());
    }

    #[test]
    fn resolve_paths_makes_socket_dir_absolute() {
        let mut config = CorewardConfig::default();
        config.resolve_paths("/srv/coreward");
        assert_eq!(
            config.server.socket_dir,
            PathBuf::from("/srv/coreward/.coreward/sockets")
        );
    }
}
