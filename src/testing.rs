//! 可编排失败的内存驱动，仅用于测试
//!
//! 记录每一次调用，并可在描述匹配时注入错误，用于验证清理顺序与恰好一次的关闭。

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use crate::database::{
    Connection, ConnectionUrl, Credentials, Driver, Framework, ResultSetHandle, Row, SqlError,
    SqlErrors, SqlResult, StatementHandle, Value,
};

/// 调用描述包含 `pattern` 时失败
#[derive(Debug, Clone)]
pub struct StepFailure {
    pattern: String,
    error: SqlError,
}

impl StepFailure {
    pub fn on(pattern: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            error: SqlError::new("XJ999", 99999, format!("scripted failure: {}", pattern)),
        }
    }
}

/// 关闭引擎时的行为
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownScript {
    /// 返回正常关闭信号
    Sentinel,
    /// 不返回任何错误
    Silent,
    /// 返回其它错误
    Fails,
}

struct State {
    framework: Framework,
    calls: Vec<String>,
    failures: Vec<StepFailure>,
    rows: Vec<Row>,
    shutdown: ShutdownScript,
    open: HashSet<u32>,
    next_id: u32,
}

impl State {
    /// 记录调用，匹配到注入的失败时返回错误
    fn call(&mut self, description: String) -> SqlResult<()> {
        let failure = self
            .failures
            .iter()
            .find(|f| description.contains(&f.pattern))
            .map(|f| f.error.clone());
        self.calls.push(description);
        match failure {
            Some(error) => Err(error.into()),
            None => Ok(()),
        }
    }

    fn allocate(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.open.insert(id);
        id
    }

    fn release(&mut self, id: u32, what: String) -> SqlResult<()> {
        if self.open.remove(&id) {
            Ok(())
        } else {
            Err(SqlError::new("XJ012", 20000, format!("'{}' already closed.", what)).into())
        }
    }
}

/// 脚本化驱动
#[derive(Clone)]
pub struct ScriptedDriver {
    state: Rc<RefCell<State>>,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(State {
                framework: Framework::Embedded,
                calls: Vec::new(),
                failures: Vec::new(),
                rows: rows(&[(300, "Lakeshore Ave."), (1910, "Union St.")]),
                shutdown: ShutdownScript::Sentinel,
                open: HashSet::new(),
                next_id: 1,
            })),
        }
    }

    pub fn client() -> Self {
        let driver = Self::new();
        driver.state.borrow_mut().framework = Framework::Client;
        driver
    }

    pub fn fail(self, failure: StepFailure) -> Self {
        self.state.borrow_mut().failures.push(failure);
        self
    }

    pub fn with_rows(self, locations: &[(i64, &str)]) -> Self {
        self.state.borrow_mut().rows = rows(locations);
        self
    }

    pub fn with_shutdown(self, shutdown: ShutdownScript) -> Self {
        self.state.borrow_mut().shutdown = shutdown;
        self
    }

    /// 全部调用记录
    pub fn calls(&self) -> Vec<String> {
        self.state.borrow().calls.clone()
    }

    /// 关闭类调用（包括失败的尝试）
    pub fn closes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with("close "))
            .collect()
    }

    /// 仍未关闭的句柄数
    pub fn open_handles(&self) -> usize {
        self.state.borrow().open.len()
    }
}

fn rows(locations: &[(i64, &str)]) -> Vec<Row> {
    locations
        .iter()
        .map(|(num, addr)| Row::new(vec![Value::Integer(*num), Value::from(*addr)]))
        .collect()
}

impl Driver for ScriptedDriver {
    fn framework(&self) -> Framework {
        self.state.borrow().framework
    }

    fn connect(&self, url: &ConnectionUrl, _credentials: &Credentials) -> SqlResult<Box<dyn Connection>> {
        self.state.borrow_mut().call(format!("connect {}", url))?;
        Ok(Box::new(ScriptedConnection {
            state: Rc::clone(&self.state),
            result_sets: Vec::new(),
            closed: false,
        }))
    }

    fn shutdown(&self) -> SqlResult<()> {
        let mut state = self.state.borrow_mut();
        state.call("shutdown".to_string())?;
        match state.shutdown {
            ShutdownScript::Sentinel => Err(SqlError::engine_shutdown().into()),
            ShutdownScript::Silent => Ok(()),
            ShutdownScript::Fails => Err(SqlError::new("XJ015", 40000, "shutdown refused").into()),
        }
    }
}

struct ScriptedConnection {
    state: Rc<RefCell<State>>,
    /// (句柄, 剩余行)
    result_sets: Vec<(ResultSetHandle, Vec<Row>)>,
    closed: bool,
}

impl Connection for ScriptedConnection {
    fn create_statement(&mut self) -> SqlResult<StatementHandle> {
        let mut state = self.state.borrow_mut();
        let handle = StatementHandle(state.next_id);
        state.call(format!("create {}", handle))?;
        state.allocate();
        Ok(handle)
    }

    fn prepare_statement(&mut self, sql: &str) -> SqlResult<StatementHandle> {
        let mut state = self.state.borrow_mut();
        let handle = StatementHandle(state.next_id);
        state.call(format!("prepare {}: {}", handle, sql))?;
        state.allocate();
        Ok(handle)
    }

    fn execute(&mut self, statement: StatementHandle, sql: &str) -> SqlResult<()> {
        self.state
            .borrow_mut()
            .call(format!("execute {}: {}", statement, sql))
    }

    fn execute_update(&mut self, statement: StatementHandle, params: &[Value]) -> SqlResult<u64> {
        self.state
            .borrow_mut()
            .call(format!("update {}: {:?}", statement, params))?;
        Ok(1)
    }

    fn execute_query(&mut self, statement: StatementHandle, sql: &str) -> SqlResult<ResultSetHandle> {
        let mut state = self.state.borrow_mut();
        state.call(format!("query {}: {}", statement, sql))?;
        let handle = ResultSetHandle(state.allocate());
        let mut rows = state.rows.clone();
        rows.reverse();
        self.result_sets.push((handle, rows));
        Ok(handle)
    }

    fn next_row(&mut self, result_set: ResultSetHandle) -> SqlResult<Option<Row>> {
        self.state.borrow_mut().call(format!("next {}", result_set))?;
        let rows = self
            .result_sets
            .iter_mut()
            .find(|(h, _)| *h == result_set)
            .map(|(_, rows)| rows)
            .ok_or_else(|| SqlErrors::from(SqlError::new("XCL16", 20000, "ResultSet not open.")))?;
        Ok(rows.pop())
    }

    fn close_result_set(&mut self, result_set: ResultSetHandle) -> SqlResult<()> {
        let mut state = self.state.borrow_mut();
        state.call(format!("close {}", result_set))?;
        self.result_sets.retain(|(h, _)| *h != result_set);
        state.release(result_set.0, result_set.to_string())
    }

    fn close_statement(&mut self, statement: StatementHandle) -> SqlResult<()> {
        let mut state = self.state.borrow_mut();
        // 关闭失败也视为句柄已释放，与真实驱动一致
        let outcome = state.call(format!("close {}", statement));
        let released = state.release(statement.0, statement.to_string());
        outcome.and(released)
    }

    fn commit(&mut self) -> SqlResult<()> {
        self.state.borrow_mut().call("commit".to_string())
    }

    fn close(mut self: Box<Self>) -> SqlResult<()> {
        self.closed = true;
        self.state.borrow_mut().call("close connection".to_string())
    }
}

impl Drop for ScriptedConnection {
    fn drop(&mut self) {
        if !self.closed {
            self.state.borrow_mut().calls.push("drop connection".to_string());
        }
    }
}
