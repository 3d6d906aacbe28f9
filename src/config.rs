//! 配置加载
//!
//! YAML 配置文件，所有字段可选，缺省使用默认值:
//!
//! ```yaml
//! server:
//!   host: 127.0.0.1
//!   port: 8080
//! scoring:
//!   warning_penalty: 10
//!   error_penalty: 25
//!   medium_threshold: 10
//!   critical_threshold: 50
//! smoke:
//!   base_url: http://127.0.0.1:8080
//!   timeout_secs: 10
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;
use crate::tracer::ScoringPolicy;

/// HTTP 服务配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub cors: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            cors: false,
        }
    }
}

/// 冒烟测试配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmokeSettings {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for SmokeSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub scoring: ScoringPolicy,
    pub smoke: SmokeSettings,
}

impl AppConfig {
    /// 从 YAML 字符串解析并校验
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        // serde_yaml 不接受空文档
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: AppConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml_str(&content)?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// 未指定路径时使用默认配置
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scoring.validate()?;
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::Invalid("server.host must not be empty".into()));
        }
        if self.smoke.timeout_secs == 0 {
            return Err(ConfigError::Invalid("smoke.timeout_secs must be > 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(AppConfig::from_yaml_str("").unwrap(), AppConfig::default());
        assert_eq!(AppConfig::from_yaml_str("   \n").unwrap(), AppConfig::default());
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = AppConfig::from_yaml_str(
            r#"
scoring:
  error_penalty: 40
server:
  port: 9090
"#,
        )
        .unwrap();

        assert_eq!(config.scoring.error_penalty, 40);
        assert_eq!(config.scoring.warning_penalty, 10);
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.smoke, SmokeSettings::default());
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        let err = AppConfig::from_yaml_str(
            r#"
scoring:
  medium_threshold: 80
  critical_threshold: 40
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_malformed_yaml_rejected() {
        let err = AppConfig::from_yaml_str("server: [unclosed").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "smoke:\n  base_url: http://localhost:9999\n  timeout_secs: 3").unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.smoke.base_url, "http://localhost:9999");
        assert_eq!(config.smoke.timeout_secs, 3);
    }

    #[test]
    fn test_missing_file() {
        let err = AppConfig::load(Path::new("/nonexistent/servlet-trace.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(AppConfig::load_or_default(None).is_ok());
    }
}
