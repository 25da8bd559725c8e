//! 网络驱动
//!
//! 通过 libsql 远程协议连接独立运行的 sqld 服务。libsql 客户端是异步的，
//! 每个驱动持有一个单线程 tokio 运行时，所有调用都在其上阻塞执行。

use std::collections::HashMap;
use std::sync::Arc;

use libsql::params::Params;
use tokio::runtime::{Builder, Runtime};

use crate::database::driver::{Connection, Driver, ResultSetHandle, Row, StatementHandle, Value};
use crate::database::error::{SqlError, SqlErrors, SqlResult};
use crate::database::url::{ConnectionUrl, Credentials, Framework};

/// 远程服务驱动
pub struct NetworkDriver {
    runtime: Arc<Runtime>,
}

impl NetworkDriver {
    pub fn new() -> SqlResult<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(Self {
            runtime: Arc::new(runtime),
        })
    }
}

impl Driver for NetworkDriver {
    fn framework(&self) -> Framework {
        Framework::Client
    }

    fn connect(&self, url: &ConnectionUrl, credentials: &Credentials) -> SqlResult<Box<dyn Connection>> {
        if url.is_embedded() {
            return Err(SqlError::new(
                "XJ028",
                40000,
                format!("The URL '{}' is not supported by the network driver.", url),
            )
            .into());
        }

        // sqld 以令牌鉴权，密码即令牌；数据库名由服务端部署决定
        let server = url.server_url().to_string();
        log::info!("连接远程数据库: {} (database={}, user={})", server, url.database, credentials.user);

        let database = self
            .runtime
            .block_on(libsql::Builder::new_remote(server, credentials.password.clone()).build())?;
        let conn = database.connect()?;

        Ok(Box::new(NetworkConnection {
            runtime: Arc::clone(&self.runtime),
            conn,
            statements: HashMap::new(),
            result_sets: HashMap::new(),
            next_id: 1,
        }))
    }

    /// 网络服务的生命周期不归客户端管理
    fn shutdown(&self) -> SqlResult<()> {
        log::debug!("网络模式不关闭服务端引擎");
        Ok(())
    }
}

enum NetStatement {
    Plain,
    Prepared(libsql::Statement),
}

/// libsql 远程连接
pub struct NetworkConnection {
    runtime: Arc<Runtime>,
    conn: libsql::Connection,
    statements: HashMap<StatementHandle, NetStatement>,
    result_sets: HashMap<ResultSetHandle, libsql::Rows>,
    next_id: u32,
}

impl NetworkConnection {
    fn allocate(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn closed_statement(handle: StatementHandle) -> SqlErrors {
        SqlError::new("XJ012", 20000, format!("'{}' already closed.", handle)).into()
    }

    fn ensure_transaction(&self) -> SqlResult<()> {
        if self.conn.is_autocommit() {
            self.runtime.block_on(self.conn.execute("BEGIN", ()))?;
        }
        Ok(())
    }
}

fn to_libsql(value: &Value) -> libsql::Value {
    match value {
        Value::Null => libsql::Value::Null,
        Value::Integer(v) => libsql::Value::Integer(*v),
        Value::Real(v) => libsql::Value::Real(*v),
        Value::Text(v) => libsql::Value::Text(v.clone()),
        Value::Blob(v) => libsql::Value::Blob(v.clone()),
    }
}

fn from_libsql(value: libsql::Value) -> Value {
    match value {
        libsql::Value::Null => Value::Null,
        libsql::Value::Integer(v) => Value::Integer(v),
        libsql::Value::Real(v) => Value::Real(v),
        libsql::Value::Text(v) => Value::Text(v),
        libsql::Value::Blob(v) => Value::Blob(v),
    }
}

impl Connection for NetworkConnection {
    fn create_statement(&mut self) -> SqlResult<StatementHandle> {
        let handle = StatementHandle(self.allocate());
        self.statements.insert(handle, NetStatement::Plain);
        Ok(handle)
    }

    fn prepare_statement(&mut self, sql: &str) -> SqlResult<StatementHandle> {
        let prepared = self.runtime.block_on(self.conn.prepare(sql))?;
        let handle = StatementHandle(self.allocate());
        self.statements.insert(handle, NetStatement::Prepared(prepared));
        Ok(handle)
    }

    fn execute(&mut self, statement: StatementHandle, sql: &str) -> SqlResult<()> {
        if !self.statements.contains_key(&statement) {
            return Err(Self::closed_statement(statement));
        }
        self.ensure_transaction()?;
        self.runtime.block_on(self.conn.execute(sql, ()))?;
        Ok(())
    }

    fn execute_update(&mut self, statement: StatementHandle, params: &[Value]) -> SqlResult<u64> {
        match self.statements.get(&statement) {
            Some(NetStatement::Prepared(_)) => {}
            Some(NetStatement::Plain) => {
                return Err(SqlError::new(
                    "XJ016",
                    20000,
                    format!("'{}' is not a prepared statement.", statement),
                )
                .into())
            }
            None => return Err(Self::closed_statement(statement)),
        }
        self.ensure_transaction()?;

        let params = Params::Positional(params.iter().map(to_libsql).collect());
        let Some(NetStatement::Prepared(prepared)) = self.statements.get_mut(&statement) else {
            return Err(Self::closed_statement(statement));
        };
        let changed = self.runtime.block_on(prepared.execute(params))?;
        prepared.reset();
        Ok(changed as u64)
    }

    fn execute_query(&mut self, statement: StatementHandle, sql: &str) -> SqlResult<ResultSetHandle> {
        if !self.statements.contains_key(&statement) {
            return Err(Self::closed_statement(statement));
        }
        self.ensure_transaction()?;

        let rows = self.runtime.block_on(self.conn.query(sql, ()))?;
        let handle = ResultSetHandle(self.allocate());
        self.result_sets.insert(handle, rows);
        Ok(handle)
    }

    fn next_row(&mut self, result_set: ResultSetHandle) -> SqlResult<Option<Row>> {
        let rows = self.result_sets.get_mut(&result_set).ok_or_else(|| {
            SqlErrors::from(SqlError::new("XCL16", 20000, format!("'{}' is not open.", result_set)))
        })?;
        let columns = rows.column_count();

        let Some(row) = self.runtime.block_on(rows.next())? else {
            return Ok(None);
        };
        let values = (0..columns)
            .map(|i| row.get_value(i).map(from_libsql))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(Row::new(values)))
    }

    fn close_result_set(&mut self, result_set: ResultSetHandle) -> SqlResult<()> {
        self.result_sets
            .remove(&result_set)
            .map(|_| ())
            .ok_or_else(|| SqlError::new("XCL16", 20000, format!("'{}' is not open.", result_set)).into())
    }

    fn close_statement(&mut self, statement: StatementHandle) -> SqlResult<()> {
        match self.statements.remove(&statement) {
            Some(NetStatement::Prepared(mut prepared)) => {
                prepared.finalize();
                Ok(())
            }
            Some(NetStatement::Plain) => Ok(()),
            None => Err(Self::closed_statement(statement)),
        }
    }

    fn commit(&mut self) -> SqlResult<()> {
        if !self.conn.is_autocommit() {
            self.runtime.block_on(self.conn.execute("COMMIT", ()))?;
        }
        Ok(())
    }

    fn close(self: Box<Self>) -> SqlResult<()> {
        let NetworkConnection {
            runtime,
            conn,
            statements,
            result_sets,
            ..
        } = *self;

        drop(result_sets);
        drop(statements);

        let rollback = if conn.is_autocommit() {
            Ok(0)
        } else {
            log::warn!("关闭连接时存在未提交的事务，执行回滚");
            runtime.block_on(conn.execute("ROLLBACK", ()))
        };
        drop(conn);
        rollback.map(|_| ()).map_err(SqlErrors::from)
    }
}
