//! 驱动边界
//!
//! 数据库引擎被视为外部协作者：走查流程只通过 `Driver` 与 `Connection`
//! 两个 trait 与它交互。语句和结果集以句柄表示，由连接负责其底层资源。

use std::fmt;

use crate::database::error::{SqlError, SqlErrors, SqlResult};
use crate::database::url::{ConnectionUrl, Credentials, Framework};

/// 语句句柄（普通语句与预编译语句共用）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatementHandle(pub u32);

/// 结果集句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResultSetHandle(pub u32);

impl fmt::Display for StatementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "statement#{}", self.0)
    }
}

impl fmt::Display for ResultSetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "result-set#{}", self.0)
    }
}

/// 绑定参数与列值
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Integer(_) => "INTEGER",
            Value::Real(_) => "REAL",
            Value::Text(_) => "TEXT",
            Value::Blob(_) => "BLOB",
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v.into())
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

/// 结果集中的一行，列下标从 0 开始
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn column(&self, index: usize) -> SqlResult<&Value> {
        self.values.get(index).ok_or_else(|| {
            SqlError::new(
                "S0022",
                0,
                format!("Column index {} out of range (row has {} columns)", index, self.values.len()),
            )
            .into()
        })
    }

    /// 读取整数列
    pub fn get_int(&self, index: usize) -> SqlResult<i64> {
        match self.column(index)? {
            Value::Integer(v) => Ok(*v),
            other => Err(conversion_error(index, other, "INTEGER")),
        }
    }

    /// 读取字符串列
    pub fn get_string(&self, index: usize) -> SqlResult<String> {
        match self.column(index)? {
            Value::Text(v) => Ok(v.clone()),
            other => Err(conversion_error(index, other, "TEXT")),
        }
    }
}

fn conversion_error(index: usize, found: &Value, wanted: &str) -> SqlErrors {
    SqlError::new(
        "22005",
        0,
        format!(
            "An attempt was made to get a data value of type '{}' from column {} of type '{}'.",
            wanted,
            index,
            found.type_name()
        ),
    )
    .into()
}

/// 数据库驱动
pub trait Driver {
    /// 驱动服务的连接模式
    fn framework(&self) -> Framework;

    /// 建立连接；失败时不重试
    fn connect(&self, url: &ConnectionUrl, credentials: &Credentials) -> SqlResult<Box<dyn Connection>>;

    /// 请求关闭引擎
    ///
    /// 约定：正常关闭以 `SqlError::engine_shutdown()` 错误返回，
    /// `Ok(())` 表示引擎没有发出关闭信号。
    fn shutdown(&self) -> SqlResult<()>;
}

/// 一个打开的数据库连接
///
/// 连接关闭自动提交：第一条语句之前隐式开启事务，直到 `commit`。
pub trait Connection {
    /// 创建执行任意 SQL 的普通语句
    fn create_statement(&mut self) -> SqlResult<StatementHandle>;

    /// 预编译带 `?` 占位符的语句
    fn prepare_statement(&mut self, sql: &str) -> SqlResult<StatementHandle>;

    /// 用普通语句执行一条不返回结果的 SQL
    fn execute(&mut self, statement: StatementHandle, sql: &str) -> SqlResult<()>;

    /// 绑定参数执行预编译语句，返回受影响行数
    fn execute_update(&mut self, statement: StatementHandle, params: &[Value]) -> SqlResult<u64>;

    /// 用普通语句执行查询，返回结果集句柄
    fn execute_query(&mut self, statement: StatementHandle, sql: &str) -> SqlResult<ResultSetHandle>;

    /// 读取下一行；结果集读完后返回 `None`
    fn next_row(&mut self, result_set: ResultSetHandle) -> SqlResult<Option<Row>>;

    fn close_result_set(&mut self, result_set: ResultSetHandle) -> SqlResult<()>;

    fn close_statement(&mut self, statement: StatementHandle) -> SqlResult<()>;

    /// 提交当前事务
    fn commit(&mut self) -> SqlResult<()>;

    /// 关闭连接；未提交的事务被回滚
    fn close(self: Box<Self>) -> SqlResult<()>;
}
