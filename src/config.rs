// config.rs: 编辑器配置文件 (JSON)

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::params::PlanetParams;

pub const CONFIG_FILE_NAME: &str = "little_planet.json";
pub const CONFIG_ENV_VAR: &str = "LITTLE_PLANET_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Edge length of exported PNGs, in pixels.
    pub export_size: u32,
    pub vsync: bool,
    /// `env_logger` filter, used when `RUST_LOG` is not set.
    pub log_filter: Option<String>,
    pub require_straight_alpha: bool,
    /// Camera and logo the editor starts with.
    pub params: PlanetParams,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            export_size: 2048,
            vsync: true,
            log_filter: None,
            require_straight_alpha: false,
            params: PlanetParams::default(),
        }
    }
}

impl EditorConfig {
    /// Read a config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, text).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Pick the config path: explicit argument, then the environment variable,
/// then a file next to the executable, then one in the working directory.
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    let env = std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from);
    let beside_exe = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(CONFIG_FILE_NAME)));
    choose_config_path(explicit, env, beside_exe)
}

fn choose_config_path(
    explicit: Option<&Path>,
    env: Option<PathBuf>,
    beside_exe: Option<PathBuf>,
) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Some(path) = env.filter(|p| !p.as_os_str().is_empty()) {
        return path;
    }
    match beside_exe {
        Some(path) if path.is_file() => path,
        _ => PathBuf::from(CONFIG_FILE_NAME),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::CameraParams;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "little_planet_config_{}_{name}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn missing_file_gives_defaults() {
        let path = scratch("missing").join(CONFIG_FILE_NAME);
        assert_eq!(EditorConfig::load(&path).unwrap(), EditorConfig::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = scratch("partial");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(CONFIG_FILE_NAME);
        fs::write(&path, r#"{ "export_size": 512, "params": { "camera": { "yaw": 30.0 } } }"#)
            .unwrap();

        let config = EditorConfig::load(&path).unwrap();
        assert_eq!(config.export_size, 512);
        assert!(config.vsync);
        assert_eq!(config.params.camera.yaw, 30.0);
        assert_eq!(config.params.camera.zoom, 1.0);
        assert!(config.params.show_logo);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = scratch("malformed");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(CONFIG_FILE_NAME);
        fs::write(&path, "{ not json").unwrap();

        let err = EditorConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }), "{err}");
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn save_then_load_keeps_parameters() {
        let dir = scratch("save");
        let path = dir.join("nested").join(CONFIG_FILE_NAME);
        let mut config = EditorConfig::default();
        config.params.camera = CameraParams {
            zoom: 2.5,
            yaw: -40.0,
            pitch: 12.0,
            roll: 3.0,
        };
        config.params.logo.opacity = 0.4;
        config.log_filter = Some("little_planet=debug".into());

        config.save(&path).unwrap();
        assert_eq!(EditorConfig::load(&path).unwrap(), config);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn path_resolution_order() {
        let explicit = Path::new("/tmp/explicit.json");
        let env = Some(PathBuf::from("/tmp/env.json"));
        assert_eq!(
            choose_config_path(Some(explicit), env.clone(), None),
            explicit
        );
        assert_eq!(choose_config_path(None, env, None), Path::new("/tmp/env.json"));
        assert_eq!(
            choose_config_path(None, Some(PathBuf::new()), None),
            Path::new(CONFIG_FILE_NAME)
        );
        // a file beside the executable only wins when it exists
        let absent = scratch("beside").join(CONFIG_FILE_NAME);
        assert_eq!(
            choose_config_path(None, None, Some(absent)),
            Path::new(CONFIG_FILE_NAME)
        );
    }
}
