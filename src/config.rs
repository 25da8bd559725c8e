//! 配置管理模块
//!
//! 从 `config.toml` 加载连接参数。文件不存在时使用默认值，
//! 默认值即固定的占位配置。

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::database::Credentials;
use crate::logging::LogLevel;

/// 指定配置文件路径的环境变量
pub const CONFIG_ENV: &str = "SIMPLE_APP_CONFIG";

/// 配置加载错误
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("读取配置文件失败 {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("配置文件格式错误 {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// 运行配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 数据库名
    pub database: String,

    /// 嵌入式数据库文件所在目录
    pub data_dir: PathBuf,

    /// 网络模式的服务地址
    pub network_url: String,

    pub user: String,
    pub password: String,

    /// 默认日志级别（`RUST_LOG` 优先）
    pub log_level: LogLevel,
}

impl Default for Config {
    fn default() -> Self {
        let credentials = Credentials::default();
        Self {
            database: "simpleDB".to_string(),
            data_dir: PathBuf::from("."),
            network_url: "http://localhost:8080".to_string(),
            user: credentials.user,
            password: credentials.password,
            log_level: LogLevel::default(),
        }
    }
}

impl Config {
    /// 默认配置文件路径
    ///
    /// 优先使用 `SIMPLE_APP_CONFIG`，否则为 `<config_dir>/simple-app/config.toml`。
    pub fn default_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|dir| dir.join("simple-app").join("config.toml"))
    }

    /// 从默认路径加载；文件不存在时返回默认配置
    pub fn load() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// 从指定文件加载
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.user, &self.password)
    }
}
