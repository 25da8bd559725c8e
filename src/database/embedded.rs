//! 嵌入式驱动
//!
//! 基于 rusqlite 的进程内文件数据库。数据库名 `<name>` 映射到
//! `<data_dir>/<name>.db`。

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{params_from_iter, OpenFlags};

use crate::database::driver::{Connection, Driver, ResultSetHandle, Row, StatementHandle, Value};
use crate::database::error::{SqlError, SqlErrors, SqlResult};
use crate::database::url::{ConnectionUrl, Credentials, Framework};

/// 忙等待超时
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// 进程内嵌入式引擎
pub struct EmbeddedDriver {
    data_dir: PathBuf,
    /// 本进程打开过的数据库文件，关闭引擎时逐个做检查点
    opened: RefCell<Vec<PathBuf>>,
    shut_down: Cell<bool>,
}

impl EmbeddedDriver {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            opened: RefCell::new(Vec::new()),
            shut_down: Cell::new(false),
        }
    }

    /// 数据库名对应的文件路径
    pub fn database_path(&self, database: &str) -> PathBuf {
        self.data_dir.join(format!("{}.db", database))
    }

    fn remember(&self, path: &Path) {
        let mut opened = self.opened.borrow_mut();
        if !opened.iter().any(|p| p == path) {
            opened.push(path.to_path_buf());
        }
    }

    /// 对单个数据库执行检查点：WAL 中的提交写回主文件并截断 WAL
    fn checkpoint(path: &Path) -> SqlResult<()> {
        let conn = rusqlite::Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let busy: i64 = conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |row| row.get(0))?;
        conn.close().map_err(|(_, err)| SqlErrors::from(err))?;

        if busy != 0 {
            return Err(SqlError::new(
                "40001",
                5,
                format!("Checkpoint of {:?} blocked by an open transaction.", path),
            )
            .into());
        }
        Ok(())
    }
}

impl Driver for EmbeddedDriver {
    fn framework(&self) -> Framework {
        Framework::Embedded
    }

    fn connect(&self, url: &ConnectionUrl, credentials: &Credentials) -> SqlResult<Box<dyn Connection>> {
        if self.shut_down.get() {
            return Err(SqlError::new(
                "08006",
                45000,
                "Database not available: the embedded engine has been shut down.",
            )
            .into());
        }
        if !url.is_embedded() {
            return Err(SqlError::new(
                "XJ028",
                40000,
                format!("The URL '{}' is not supported by the embedded driver.", url),
            )
            .into());
        }
        if url.database.is_empty() {
            return Err(SqlError::new("XJ004", 40000, "Database name missing from the URL.").into());
        }

        let path = self.database_path(&url.database);
        let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        if url.flag("create") {
            flags |= OpenFlags::SQLITE_OPEN_CREATE;
            std::fs::create_dir_all(&self.data_dir)?;
        } else if !path.exists() {
            return Err(SqlError::new(
                "XJ004",
                40000,
                format!("Database '{}' not found.", url.database),
            )
            .into());
        }

        // SQLite 没有用户体系，凭据只做记录
        log::debug!("嵌入式连接用户: {}", credentials.user);

        let conn = rusqlite::Connection::open_with_flags(&path, flags)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        // WAL 模式：提交先写入 WAL，关闭引擎时由检查点写回主文件
        let _journal_mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        log::info!("打开嵌入式数据库: {:?}", path);

        self.remember(&path);
        Ok(Box::new(EmbeddedConnection::new(conn)))
    }

    /// 对打开过的每个数据库执行检查点，之后拒绝新连接
    ///
    /// 成功时返回关闭信号错误；检查点失败时返回该错误且引擎保持可用。
    fn shutdown(&self) -> SqlResult<()> {
        let opened: Vec<PathBuf> = self.opened.borrow().clone();
        for path in &opened {
            Self::checkpoint(path)?;
            log::debug!("检查点完成: {:?}", path);
        }

        self.shut_down.set(true);
        log::info!("嵌入式引擎已关闭（{} 个数据库）", opened.len());
        Err(SqlError::engine_shutdown().into())
    }
}

#[derive(Debug)]
enum StatementKind {
    Plain,
    Prepared { sql: String },
}

/// rusqlite 连接
///
/// 预编译语句保存在 rusqlite 的语句缓存中，句柄只记录 SQL 文本；
/// 结果集在查询时一次性取回。
pub struct EmbeddedConnection {
    conn: rusqlite::Connection,
    statements: HashMap<StatementHandle, StatementKind>,
    result_sets: HashMap<ResultSetHandle, VecDeque<Row>>,
    next_id: u32,
}

impl EmbeddedConnection {
    fn new(conn: rusqlite::Connection) -> Self {
        Self {
            conn,
            statements: HashMap::new(),
            result_sets: HashMap::new(),
            next_id: 1,
        }
    }

    fn allocate(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn statement(&self, handle: StatementHandle) -> SqlResult<&StatementKind> {
        self.statements.get(&handle).ok_or_else(|| {
            SqlError::new("XJ012", 20000, format!("'{}' already closed.", handle)).into()
        })
    }

    /// 自动提交关闭：没有活动事务时先开启一个
    fn ensure_transaction(&self) -> SqlResult<()> {
        if self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN")?;
        }
        Ok(())
    }
}

fn to_sqlite(value: &Value) -> rusqlite::types::Value {
    use rusqlite::types::Value as Sqlite;

    match value {
        Value::Null => Sqlite::Null,
        Value::Integer(v) => Sqlite::Integer(*v),
        Value::Real(v) => Sqlite::Real(*v),
        Value::Text(v) => Sqlite::Text(v.clone()),
        Value::Blob(v) => Sqlite::Blob(v.clone()),
    }
}

fn from_sqlite(value: rusqlite::types::Value) -> Value {
    use rusqlite::types::Value as Sqlite;

    match value {
        Sqlite::Null => Value::Null,
        Sqlite::Integer(v) => Value::Integer(v),
        Sqlite::Real(v) => Value::Real(v),
        Sqlite::Text(v) => Value::Text(v),
        Sqlite::Blob(v) => Value::Blob(v),
    }
}

impl Connection for EmbeddedConnection {
    fn create_statement(&mut self) -> SqlResult<StatementHandle> {
        let handle = StatementHandle(self.allocate());
        self.statements.insert(handle, StatementKind::Plain);
        Ok(handle)
    }

    fn prepare_statement(&mut self, sql: &str) -> SqlResult<StatementHandle> {
        // 立即编译以尽早暴露语法错误，编译结果留在缓存中
        self.conn.prepare_cached(sql)?;
        let handle = StatementHandle(self.allocate());
        self.statements.insert(
            handle,
            StatementKind::Prepared {
                sql: sql.to_string(),
            },
        );
        Ok(handle)
    }

    fn execute(&mut self, statement: StatementHandle, sql: &str) -> SqlResult<()> {
        self.statement(statement)?;
        self.ensure_transaction()?;
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    fn execute_update(&mut self, statement: StatementHandle, params: &[Value]) -> SqlResult<u64> {
        let sql = match self.statement(statement)? {
            StatementKind::Prepared { sql } => sql.clone(),
            StatementKind::Plain => {
                return Err(SqlError::new(
                    "XJ016",
                    20000,
                    format!("'{}' is not a prepared statement.", statement),
                )
                .into())
            }
        };
        self.ensure_transaction()?;

        let mut stmt = self.conn.prepare_cached(&sql)?;
        let changed = stmt.execute(params_from_iter(params.iter().map(to_sqlite)))?;
        Ok(changed as u64)
    }

    fn execute_query(&mut self, statement: StatementHandle, sql: &str) -> SqlResult<ResultSetHandle> {
        self.statement(statement)?;
        self.ensure_transaction()?;

        let rows = {
            let mut stmt = self.conn.prepare(sql)?;
            let columns = stmt.column_count();
            let mapped = stmt.query_map([], |row| {
                (0..columns)
                    .map(|i| row.get::<_, rusqlite::types::Value>(i).map(from_sqlite))
                    .collect::<rusqlite::Result<Vec<_>>>()
            })?;
            mapped
                .map(|values| values.map(Row::new))
                .collect::<rusqlite::Result<VecDeque<_>>>()?
        };

        let handle = ResultSetHandle(self.allocate());
        log::debug!("{} 返回 {} 行", handle, rows.len());
        self.result_sets.insert(handle, rows);
        Ok(handle)
    }

    fn next_row(&mut self, result_set: ResultSetHandle) -> SqlResult<Option<Row>> {
        let rows = self.result_sets.get_mut(&result_set).ok_or_else(|| {
            SqlErrors::from(SqlError::new("XCL16", 20000, format!("'{}' is not open.", result_set)))
        })?;
        Ok(rows.pop_front())
    }

    fn close_result_set(&mut self, result_set: ResultSetHandle) -> SqlResult<()> {
        self.result_sets
            .remove(&result_set)
            .map(|_| ())
            .ok_or_else(|| SqlError::new("XCL16", 20000, format!("'{}' is not open.", result_set)).into())
    }

    fn close_statement(&mut self, statement: StatementHandle) -> SqlResult<()> {
        self.statement(statement)?;
        self.statements.remove(&statement);
        Ok(())
    }

    fn commit(&mut self) -> SqlResult<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("COMMIT")?;
        }
        Ok(())
    }

    fn close(self: Box<Self>) -> SqlResult<()> {
        let EmbeddedConnection {
            conn,
            statements,
            result_sets,
            ..
        } = *self;

        if !statements.is_empty() || !result_sets.is_empty() {
            log::warn!(
                "关闭连接时仍有 {} 个语句、{} 个结果集未关闭",
                statements.len(),
                result_sets.len()
            );
        }

        let rollback = if conn.is_autocommit() {
            Ok(())
        } else {
            log::warn!("关闭连接时存在未提交的事务，执行回滚");
            conn.execute_batch("ROLLBACK")
        };

        conn.flush_prepared_statement_cache();
        conn.close().map_err(|(_, err)| SqlErrors::from(err))?;
        rollback.map_err(SqlErrors::from)
    }
}
