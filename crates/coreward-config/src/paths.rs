//! Path utilities and XDG directory discovery.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;

use crate::ConfigError;

pub struct Paths {
    project_dirs: Option<ProjectDirs>,
}

impl Paths {
    pub fn new() -> Self {
        Self {
            project_dirs: ProjectDirs::from("io", "coreward", "coreward"),
        }
    }

    /// `~/.config/coreward/config.toml`, when a config directory could
    /// be determined for the current platform.
    pub fn user_config_file(&self) -> Result<PathBuf, ConfigError> {
        self.project_dirs
            .as_ref()
            .map(|p| p.config_dir().join("config.toml"))
            .ok_or(ConfigError::Xdg)
    }

    /// `<project_dir>/coreward.toml`.
    pub fn project_config_file(project_dir: impl AsRef<Path>) -> PathBuf {
        project_dir.as_ref().join("coreward.toml")
    }

    /// Default transport socket directory, `<project_dir>/.coreward/sockets`.
    pub fn default_socket_dir(project_dir: impl AsRef<Path>) -> PathBuf {
        project_dir.as_ref().join(".coreward").join("sockets")
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}
