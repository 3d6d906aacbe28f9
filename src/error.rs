//! 错误类型
//!
//! 追踪算法本身没有失败路径；错误只来自外部输入
//! (组件类型名、部署描述符、配置文件)。

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced to callers instead of silently defaulting an assessment
#[derive(Debug, Error)]
pub enum TraceError {
    /// 未知的组件类型
    #[error("unsupported component kind: '{0}' (expected servlet, filter, listener or all)")]
    UnsupportedComponentKind(String),

    /// 输入无法解析 (例如 web.xml 格式错误)
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
