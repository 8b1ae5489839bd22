use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::config::{
    BoardlinkConfig, ConnectOptions, DeviceProfile, SerialOptions, UsbOptions,
};
use crate::domain::error::{DeviceError, DeviceResult};

/// Locates and merges the global and project configuration files.
///
/// The global file lives at `~/.config/boardlink/config.toml` and carries
/// defaults; a `.boardlink/config.toml` found by walking up from the current
/// directory contributes project device profiles.
pub struct ConfigManager {
    global_config_path: PathBuf,
    project_config_path: Option<PathBuf>,
}

impl ConfigManager {
    pub fn new() -> DeviceResult<Self> {
        let global_config_path = Self::global_path()?;
        let project_config_path = std::env::current_dir()
            .ok()
            .and_then(|dir| Self::find_project_config(&dir));

        Ok(Self {
            global_config_path,
            project_config_path,
        })
    }

    /// Load the merged configuration, falling back to defaults for anything
    /// not present on disk.
    pub fn load_config(&self) -> DeviceResult<BoardlinkConfig> {
        let mut config = BoardlinkConfig::default();

        if self.global_config_path.exists() {
            let global_config = Self::load_config_from_path(&self.global_config_path)?;
            config.global = global_config.global;
            config.devices = global_config.devices;
        }

        if let Some(project_path) = &self.project_config_path {
            if project_path.exists() {
                let project_config = Self::load_config_from_path(project_path)?;
                config.devices.extend(project_config.devices);
            }
        }

        Ok(config)
    }

    /// Persist global settings; device profiles go to the project file when
    /// one is in scope.
    pub fn save_config(&self, config: &BoardlinkConfig) -> DeviceResult<()> {
        if let Some(parent) = self.global_config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| DeviceError::Config {
                message: format!("failed to create config directory: {}", e),
            })?;
        }

        let global_config = BoardlinkConfig {
            global: config.global.clone(),
            devices: Vec::new(),
        };
        Self::save_config_to_path(&self.global_config_path, &global_config)?;

        if let Some(project_path) = &self.project_config_path {
            let project_config = BoardlinkConfig {
                global: Default::default(),
                devices: config.devices.clone(),
            };
            Self::save_config_to_path(project_path, &project_config)?;
        }

        Ok(())
    }

    fn global_path() -> DeviceResult<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| DeviceError::Config {
            message: "could not determine home directory".to_string(),
        })?;
        Ok(home.join(".config").join("boardlink").join("config.toml"))
    }

    /// Walk up from `start` looking for `.boardlink/config.toml`.
    pub fn find_project_config(start: &Path) -> Option<PathBuf> {
        let mut path = start;
        loop {
            let config_path = path.join(".boardlink").join("config.toml");
            if config_path.exists() {
                return Some(config_path);
            }
            path = path.parent()?;
        }
    }

    pub fn load_config_from_path(path: &Path) -> DeviceResult<BoardlinkConfig> {
        let content = fs::read_to_string(path).map_err(|e| DeviceError::Config {
            message: format!("failed to read config file {}: {}", path.display(), e),
        })?;

        toml::from_str(&content).map_err(|e| DeviceError::Config {
            message: format!("failed to parse config file {}: {}", path.display(), e),
        })
    }

    pub fn save_config_to_path(path: &Path, config: &BoardlinkConfig) -> DeviceResult<()> {
        let content = toml::to_string_pretty(config).map_err(|e| DeviceError::Config {
            message: format!("failed to serialize config: {}", e),
        })?;

        fs::write(path, content).map_err(|e| DeviceError::Config {
            message: format!("failed to write config file {}: {}", path.display(), e),
        })
    }

    /// Create a `.boardlink/config.toml` under `dir` seeded with example
    /// profiles. Fails if one already exists.
    pub fn init_project_config(&self, dir: &Path) -> DeviceResult<PathBuf> {
        let config_dir = dir.join(".boardlink");
        let config_file = config_dir.join("config.toml");

        if config_file.exists() {
            return Err(DeviceError::Config {
                message: "project configuration already exists".to_string(),
            });
        }

        fs::create_dir_all(&config_dir).map_err(|e| DeviceError::Config {
            message: format!("failed to create .boardlink directory: {}", e),
        })?;

        let default_config = BoardlinkConfig {
            global: Default::default(),
            devices: vec![
                DeviceProfile {
                    name: "pico-serial".to_string(),
                    description: "Raspberry Pi Pico over USB CDC serial".to_string(),
                    connect: ConnectOptions::Serial(SerialOptions::new("/dev/ttyACM0")),
                },
                DeviceProfile {
                    name: "pico-usb".to_string(),
                    description: "Raspberry Pi Pico over raw USB bulk".to_string(),
                    connect: ConnectOptions::Usb(UsbOptions {
                        vendor_id: Some(0x2e8a),
                        product_id: Some(0x0005),
                        ..UsbOptions::default()
                    }),
                },
            ],
        };

        Self::save_config_to_path(&config_file, &default_config)?;
        Ok(config_file)
    }

    pub fn project_config_path(&self) -> Option<&Path> {
        self.project_config_path.as_deref()
    }

    pub fn global_config_path(&self) -> &Path {
        &self.global_config_path
    }
}
