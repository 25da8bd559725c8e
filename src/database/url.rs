//! 连接模式与连接字符串
//!
//! 连接字符串沿用 `协议 + 数据库名 + ;键=值` 的属性写法，
//! 例如 `sqlite:simpleDB;create=true`。

use std::fmt;

use crate::config::Config;
use crate::database::error::{SqlError, SqlErrors, SqlResult};

/// 网络模式的命令行关键字（不区分大小写）
pub const CLIENT_KEYWORD: &str = "client";

/// 嵌入式驱动的协议前缀
pub const EMBEDDED_PROTOCOL: &str = "sqlite:";

/// 连接模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framework {
    /// 引擎运行在本进程内
    Embedded,
    /// 引擎是独立的网络服务进程
    Client,
}

impl Framework {
    /// 根据可选的命令行参数选择模式
    ///
    /// 只有 `client`（不区分大小写）选择网络模式，其余输入都回落到嵌入式模式。
    pub fn from_argument(arg: Option<&str>) -> Self {
        match arg {
            Some(value) if value.eq_ignore_ascii_case(CLIENT_KEYWORD) => Framework::Client,
            _ => Framework::Embedded,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Framework::Embedded => "embedded",
            Framework::Client => "client",
        }
    }

    /// 嵌入式模式才需要显式关闭引擎
    pub fn requires_engine_shutdown(&self) -> bool {
        matches!(self, Framework::Embedded)
    }

    /// 构造本模式下的连接字符串
    ///
    /// 网络模式的地址来自配置，经 [`ConnectionUrl::parse`] 校验，格式错误时在连接前报错。
    pub fn connection_url(&self, config: &Config) -> SqlResult<ConnectionUrl> {
        match self {
            Framework::Embedded => Ok(ConnectionUrl::new(EMBEDDED_PROTOCOL, &config.database)
                .with_attribute("create", "true")),
            Framework::Client => {
                let base = config.network_url.trim_end_matches('/');
                let url = ConnectionUrl::parse(&format!("{}/{}", base, config.database))?;
                if url.is_embedded() {
                    return Err(invalid_url(&config.network_url));
                }
                Ok(url)
            }
        }
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 解析后的连接字符串
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionUrl {
    /// 协议部分，包含结尾的 `:` 或 `/`
    pub protocol: String,
    pub database: String,
    /// 按出现顺序保存的连接属性
    pub attributes: Vec<(String, String)>,
}

impl ConnectionUrl {
    pub fn new(protocol: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            protocol: protocol.into(),
            database: database.into(),
            attributes: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    /// 查找属性值（键不区分大小写）
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// 属性值为 `true` 时返回 true
    pub fn flag(&self, key: &str) -> bool {
        self.attribute(key)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    pub fn is_embedded(&self) -> bool {
        self.protocol == EMBEDDED_PROTOCOL
    }

    /// 网络模式下服务端的基础地址（不含数据库名）
    pub fn server_url(&self) -> &str {
        self.protocol.trim_end_matches('/')
    }

    /// 解析连接字符串
    ///
    /// 支持 `sqlite:<db>[;k=v]*` 与 `http(s)://host:port/<db>[;k=v]*` 两种形式。
    pub fn parse(input: &str) -> SqlResult<Self> {
        let mut parts = input.split(';');
        let head = parts.next().unwrap_or_default();

        let (protocol, database) = if let Some(database) = head.strip_prefix(EMBEDDED_PROTOCOL) {
            (EMBEDDED_PROTOCOL.to_string(), database.to_string())
        } else if let Some((scheme, rest)) = ["http://", "https://"]
            .iter()
            .find_map(|scheme| head.strip_prefix(scheme).map(|rest| (*scheme, rest)))
        {
            // 数据库名是最后一段路径
            match rest.rsplit_once('/') {
                Some((authority, database)) if !authority.is_empty() => {
                    (format!("{}{}/", scheme, authority), database.to_string())
                }
                _ => (format!("{}{}/", scheme, rest), String::new()),
            }
        } else {
            return Err(invalid_url(input));
        };

        let mut url = ConnectionUrl::new(protocol, database);
        for part in parts.filter(|p| !p.is_empty()) {
            match part.split_once('=') {
                Some((key, value)) if !key.trim().is_empty() => {
                    url.attributes
                        .push((key.trim().to_string(), value.trim().to_string()));
                }
                _ => return Err(invalid_url(input)),
            }
        }

        Ok(url)
    }
}

fn invalid_url(input: &str) -> SqlErrors {
    SqlError::new("XJ028", 40000, format!("The URL '{}' is not properly formed.", input)).into()
}

impl fmt::Display for ConnectionUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.protocol, self.database)?;
        for (key, value) in &self.attributes {
            write!(f, ";{}={}", key, value)?;
        }
        Ok(())
    }
}

/// 连接凭据
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::new("user1", "user1")
    }
}

// 密码不进入日志
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}
