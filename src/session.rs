//! 资源会话
//!
//! 记录本次运行打开的连接、语句和结果集，并保证每个句柄恰好关闭一次。
//! 释放顺序：结果集 → 语句（按打开顺序）→ 连接。每次关闭互相独立，
//! 某个资源关闭失败不会阻止后续资源的关闭。

use std::fmt;

use crate::database::{Connection, ResultSetHandle, Row, SqlError, SqlErrors, SqlResult, StatementHandle, Value};

/// 被跟踪的资源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    ResultSet(ResultSetHandle),
    Statement(StatementHandle),
    Connection,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::ResultSet(h) => write!(f, "{}", h),
            Resource::Statement(h) => write!(f, "{}", h),
            Resource::Connection => f.write_str("connection"),
        }
    }
}

/// 单个资源的关闭失败
#[derive(Debug, Clone, PartialEq)]
pub struct CleanupFailure {
    pub resource: Resource,
    pub errors: SqlErrors,
}

/// 一次运行的资源作用域
#[derive(Default)]
pub struct Session {
    connection: Option<Box<dyn Connection>>,
    /// 按打开顺序排列
    statements: Vec<StatementHandle>,
    result_set: Option<ResultSetHandle>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// 接管一个已打开的连接
    pub fn attach(&mut self, connection: Box<dyn Connection>) {
        debug_assert!(self.connection.is_none(), "session already holds a connection");
        self.connection = Some(connection);
    }

    /// 当前仍未释放的资源，按释放顺序排列
    pub fn open_resources(&self) -> Vec<Resource> {
        let mut resources: Vec<Resource> = self.result_set.map(Resource::ResultSet).into_iter().collect();
        resources.extend(self.statements.iter().copied().map(Resource::Statement));
        if self.connection.is_some() {
            resources.push(Resource::Connection);
        }
        resources
    }

    fn connection(&mut self) -> SqlResult<&mut (dyn Connection + 'static)> {
        self.connection
            .as_deref_mut()
            .ok_or_else(|| SqlError::new("08003", 40000, "No current connection.").into())
    }

    pub fn create_statement(&mut self) -> SqlResult<StatementHandle> {
        let handle = self.connection()?.create_statement()?;
        self.statements.push(handle);
        Ok(handle)
    }

    pub fn prepare_statement(&mut self, sql: &str) -> SqlResult<StatementHandle> {
        let handle = self.connection()?.prepare_statement(sql)?;
        self.statements.push(handle);
        Ok(handle)
    }

    pub fn execute(&mut self, statement: StatementHandle, sql: &str) -> SqlResult<()> {
        self.connection()?.execute(statement, sql)
    }

    pub fn execute_update(&mut self, statement: StatementHandle, params: &[Value]) -> SqlResult<u64> {
        self.connection()?.execute_update(statement, params)
    }

    /// 执行查询并把结果集登记为当前结果集
    ///
    /// 已有结果集时先将其关闭。
    pub fn execute_query(&mut self, statement: StatementHandle, sql: &str) -> SqlResult<ResultSetHandle> {
        self.close_result_set()?;
        let handle = self.connection()?.execute_query(statement, sql)?;
        self.result_set = Some(handle);
        Ok(handle)
    }

    /// 从当前结果集读取下一行
    pub fn next_row(&mut self) -> SqlResult<Option<Row>> {
        let result_set = self
            .result_set
            .ok_or_else(|| SqlErrors::from(SqlError::new("XCL16", 20000, "ResultSet not open.")))?;
        self.connection()?.next_row(result_set)
    }

    /// 关闭当前结果集（若有）
    pub fn close_result_set(&mut self) -> SqlResult<()> {
        match self.result_set.take() {
            Some(handle) => self.connection()?.close_result_set(handle),
            None => Ok(()),
        }
    }

    pub fn commit(&mut self) -> SqlResult<()> {
        self.connection()?.commit()
    }

    /// 释放全部资源，返回各资源的关闭失败
    ///
    /// 每个句柄在登记处被取走后才关闭，重复调用不会重复关闭。
    pub fn release(&mut self) -> Vec<CleanupFailure> {
        let mut failures = Vec::new();

        if let Some(handle) = self.result_set.take() {
            if let Err(errors) = self.close_with(|conn| conn.close_result_set(handle)) {
                failures.push(CleanupFailure {
                    resource: Resource::ResultSet(handle),
                    errors,
                });
            }
        }

        let statements: Vec<StatementHandle> = self.statements.drain(..).collect();
        for handle in statements {
            if let Err(errors) = self.close_with(|conn| conn.close_statement(handle)) {
                failures.push(CleanupFailure {
                    resource: Resource::Statement(handle),
                    errors,
                });
            }
        }

        if let Some(connection) = self.connection.take() {
            if let Err(errors) = connection.close() {
                failures.push(CleanupFailure {
                    resource: Resource::Connection,
                    errors,
                });
            }
        }

        for failure in &failures {
            log::warn!("关闭 {} 失败: {}", failure.resource, failure.errors);
        }
        failures
    }

    fn close_with(
        &mut self,
        close: impl FnOnce(&mut (dyn Connection + 'static)) -> SqlResult<()>,
    ) -> SqlResult<()> {
        close(self.connection()?)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.open_resources().is_empty() {
            return;
        }
        log::debug!("会话未显式释放，在析构时关闭剩余资源");
        for failure in self.release() {
            log::error!("析构时关闭 {} 失败: {}", failure.resource, failure.errors);
        }
    }
}
