//! 数据库层错误
//!
//! 驱动返回的错误在转换时即被展开为有序的结构化记录列表，
//! 每条记录携带 SQL 状态码、数值错误码和消息。

use std::error::Error as StdError;
use std::fmt;

/// 嵌入式引擎正常关闭时返回的 SQL 状态码
pub const SHUTDOWN_STATE: &str = "XJ015";

/// 嵌入式引擎正常关闭时返回的错误码
pub const SHUTDOWN_CODE: i32 = 50000;

/// 通用 SQL 状态码（无法进一步归类的错误）
pub const GENERAL_STATE: &str = "HY000";

/// 单条结构化错误记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlError {
    /// 五位 SQL 状态码
    pub state: String,
    /// 驱动相关的数值错误码
    pub code: i32,
    pub message: String,
}

impl SqlError {
    pub fn new(state: impl Into<String>, code: i32, message: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            code,
            message: message.into(),
        }
    }

    /// 无法归类的错误
    pub fn general(message: impl Into<String>) -> Self {
        Self::new(GENERAL_STATE, 0, message)
    }

    /// 嵌入式引擎正常关闭的信号
    pub fn engine_shutdown() -> Self {
        Self::new(SHUTDOWN_STATE, SHUTDOWN_CODE, "Embedded engine shutdown.")
    }

    /// 是否为正常关闭信号
    pub fn is_engine_shutdown(&self) -> bool {
        self.code == SHUTDOWN_CODE && self.state == SHUTDOWN_STATE
    }
}

impl fmt::Display for SqlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}/{}] {}", self.state, self.code, self.message)
    }
}

/// 聚合的数据库错误
///
/// 至少包含一条记录；第一条是最外层错误，后续记录是其原因链。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlErrors {
    records: Vec<SqlError>,
}

impl SqlErrors {
    pub fn single(record: SqlError) -> Self {
        Self {
            records: vec![record],
        }
    }

    /// 由首条记录和原因链构造
    pub fn with_causes(first: SqlError, causes: impl IntoIterator<Item = SqlError>) -> Self {
        let mut records = vec![first];
        records.extend(causes);
        Self { records }
    }

    pub fn records(&self) -> &[SqlError] {
        &self.records
    }

    pub fn first(&self) -> &SqlError {
        &self.records[0]
    }
}

impl fmt::Display for SqlErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.first())
    }
}

impl StdError for SqlErrors {}

impl From<SqlError> for SqlErrors {
    fn from(record: SqlError) -> Self {
        Self::single(record)
    }
}

pub type SqlResult<T> = Result<T, SqlErrors>;

/// 将 `source()` 链展开为通用记录
fn cause_records(err: &dyn StdError) -> Vec<SqlError> {
    let mut causes = Vec::new();
    let mut next = err.source();
    while let Some(cause) = next {
        causes.push(SqlError::general(cause.to_string()));
        next = cause.source();
    }
    causes
}

/// SQLite 结果码到 SQL 状态码的映射
fn sqlite_state(code: rusqlite::ErrorCode) -> &'static str {
    use rusqlite::ErrorCode;

    match code {
        ErrorCode::ConstraintViolation => "23000",
        ErrorCode::CannotOpen | ErrorCode::NotADatabase => "08001",
        ErrorCode::PermissionDenied | ErrorCode::ReadOnly => "42501",
        ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => "40001",
        ErrorCode::TooBig => "22001",
        ErrorCode::TypeMismatch => "22005",
        ErrorCode::DatabaseCorrupt => "XSDG1",
        _ => "42X00",
    }
}

impl From<rusqlite::Error> for SqlErrors {
    fn from(err: rusqlite::Error) -> Self {
        let first = match &err {
            rusqlite::Error::SqliteFailure(failure, message) => SqlError::new(
                sqlite_state(failure.code),
                failure.extended_code,
                message.clone().unwrap_or_else(|| failure.to_string()),
            ),
            // 编译期捕获的 SQL 错误（如表已存在）带有偏移量信息
            rusqlite::Error::SqlInputError { error, msg, .. } => {
                SqlError::new(sqlite_state(error.code), error.extended_code, msg.clone())
            }
            rusqlite::Error::InvalidColumnType(..)
            | rusqlite::Error::IntegralValueOutOfRange(..)
            | rusqlite::Error::FromSqlConversionFailure(..) => {
                SqlError::new("22005", 0, err.to_string())
            }
            rusqlite::Error::InvalidParameterCount(..)
            | rusqlite::Error::InvalidParameterName(..) => {
                SqlError::new("07001", 0, err.to_string())
            }
            other => SqlError::general(other.to_string()),
        };
        Self::with_causes(first, cause_records(&err))
    }
}

impl From<libsql::Error> for SqlErrors {
    fn from(err: libsql::Error) -> Self {
        let first = SqlError::new("08006", 0, err.to_string());
        Self::with_causes(first, cause_records(&err))
    }
}

impl From<std::io::Error> for SqlErrors {
    fn from(err: std::io::Error) -> Self {
        Self::with_causes(SqlError::new("58030", 0, err.to_string()), cause_records(&err))
    }
}
