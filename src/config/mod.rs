use crate::error::{FrontendError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Overrides `transform.program`.
pub const PROGRAM_ENV: &str = "DOCKERFILE_TRANSFORM_PROGRAM";
/// Overrides `relay.bind_addr`.
pub const RELAY_BIND_ENV: &str = "DOCKERFILE_RELAY_BIND";

/// dockerfile-transform 설정
///
/// 설정 파일은 ~/.config/dockerfile-transform/config.toml에 저장됩니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub transform: TransformConfig,

    #[serde(default)]
    pub relay: RelayConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Transform 실행 파일 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformConfig {
    /// 실행 파일 이름 또는 경로
    #[serde(default = "default_program")]
    pub program: String,

    /// 첫 번째 인자로 전달되는 고정 subcommand
    #[serde(default = "default_subcommand")]
    pub subcommand: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Listen address. Port 0 picks an ephemeral port per build.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// 요청 프레임 최대 크기 (bytes)
    #[serde(default = "default_max_request_bytes")]
    pub max_request_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `RUST_LOG` 형식의 기본 필터 (RUST_LOG가 설정되면 그 값이 우선)
    #[serde(default = "default_filter")]
    pub filter: String,

    /// JSON 로그 출력 여부
    #[serde(default)]
    pub json: bool,
}

fn default_program() -> String {
    "castor".to_string()
}

fn default_subcommand() -> String {
    "transform-docker-file".to_string()
}

fn default_bind_addr() -> String {
    "127.0.0.1:0".to_string()
}

fn default_max_request_bytes() -> usize {
    crate::relay::protocol::DEFAULT_MAX_REQUEST_BYTES
}

fn default_filter() -> String {
    "dockerfile_transform=info".to_string()
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            subcommand: default_subcommand(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_request_bytes: default_max_request_bytes(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            json: false,
        }
    }
}

impl Config {
    /// 기본 설정 파일 경로
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("dockerfile-transform").join("config.toml"))
    }

    /// 기본 경로에서 로드 (파일이 없으면 기본값 사용)
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// 지정한 파일에서 로드
    ///
    /// # Examples
    /// ```no_run
    /// use dockerfile_transform::config::Config;
    ///
    /// let config = Config::load_from("frontend.toml".as_ref()).unwrap();
    /// println!("{}", config.transform.program);
    /// ```
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            FrontendError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
            .map_err(|e| FrontendError::ConfigError(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| FrontendError::ConfigError(e.to_string()))
    }

    /// 설정을 파일에 저장
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir)?;
            }
        }

        let toml_string =
            toml::to_string_pretty(self).map_err(|e| FrontendError::ConfigError(e.to_string()))?;
        fs::write(path, toml_string)?;

        Ok(())
    }

    /// 환경 변수로 설정 덮어쓰기
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(program) = lookup(PROGRAM_ENV).filter(|v| !v.is_empty()) {
            self.transform.program = program;
        }
        if let Some(bind_addr) = lookup(RELAY_BIND_ENV).filter(|v| !v.is_empty()) {
            self.relay.bind_addr = bind_addr;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.transform.program, "castor");
        assert_eq!(config.transform.subcommand, "transform-docker-file");
        assert_eq!(config.relay.bind_addr, "127.0.0.1:0");
        assert_eq!(config.relay.max_request_bytes, 64 * 1024);
        assert!(!config.logging.json);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = Config::from_toml(
            r#"
            [transform]
            program = "/usr/local/bin/render"

            [relay]
            bind_addr = "0.0.0.0:6001"
        "#,
        )
        .unwrap();

        assert_eq!(config.transform.program, "/usr/local/bin/render");
        assert_eq!(config.transform.subcommand, "transform-docker-file");
        assert_eq!(config.relay.bind_addr, "0.0.0.0:6001");
        assert_eq!(config.relay.max_request_bytes, 64 * 1024);
        assert_eq!(config.logging.filter, "dockerfile_transform=info");
    }

    #[test]
    fn test_invalid_config() {
        let result = Config::from_toml("[relay]\nmax_request_bytes = \"lots\"");
        assert!(matches!(result, Err(FrontendError::ConfigError(_))));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.transform.program = "twig-render".to_string();
        config.logging.json = true;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.transform.program, "twig-render");
        assert!(loaded.logging.json);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_overrides(|key| match key {
            PROGRAM_ENV => Some("sh".to_string()),
            RELAY_BIND_ENV => Some(String::new()),
            _ => None,
        });

        assert_eq!(config.transform.program, "sh");
        assert_eq!(config.relay.bind_addr, "127.0.0.1:0");
    }
}
