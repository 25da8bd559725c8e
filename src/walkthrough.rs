//! 数据库走查流程
//!
//! 建表 → 两次插入 → 两次更新 → 查询校验 → 删表 → 提交 → 关闭嵌入式引擎，
//! 最后无论成败都释放本次打开的全部资源。

use crate::config::Config;
use crate::database::{Driver, Framework, SqlErrors, SqlResult, Value};
use crate::logging::timed;
use crate::report::Reporter;
use crate::session::Session;
use crate::verification::{verify_locations, Location, Verification};

const CREATE_TABLE: &str = "create table location(num int, addr varchar(40))";
const INSERT_LOCATION: &str = "insert into location values (?, ?)";
const UPDATE_LOCATION: &str = "update location set num=?, addr=? where num=?";
const SELECT_LOCATIONS: &str = "SELECT num, addr FROM location ORDER BY num";
const DROP_TABLE: &str = "drop table location";

/// 依次插入的行
const INSERTS: [(i64, &str); 2] = [(1956, "Webster St."), (1910, "Union St.")];

/// 依次执行的更新：(原 num, 原地址, 新 num, 新地址)
const UPDATES: [(i64, &str, i64, &str); 2] = [
    (1956, "Webster St.", 180, "Grand Ave."),
    (180, "Grand Ave.", 300, "Lakeshore Ave."),
];

/// 地址的第一个词，用于确认信息
fn street(addr: &str) -> &str {
    addr.split_whitespace().next().unwrap_or(addr)
}

/// 引擎关闭请求的结果
#[derive(Debug, Clone, PartialEq)]
pub enum ShutdownOutcome {
    /// 收到约定的关闭信号
    Normal,
    /// 引擎返回了其它错误
    Failed(SqlErrors),
    /// 引擎没有发出关闭信号
    NoSignal,
}

impl ShutdownOutcome {
    /// 只有首条记录是关闭信号时才算正常关闭
    pub fn classify(result: SqlResult<()>) -> Self {
        match result {
            Err(errors) if errors.first().is_engine_shutdown() => ShutdownOutcome::Normal,
            Err(errors) => ShutdownOutcome::Failed(errors),
            Ok(()) => ShutdownOutcome::NoSignal,
        }
    }

    pub fn is_normal(&self) -> bool {
        matches!(self, ShutdownOutcome::Normal)
    }
}

/// 一次运行的汇总
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub framework: Framework,
    /// 中断主流程的数据库错误
    pub error: Option<SqlErrors>,
    /// 查询校验结果（未执行到校验时为 `None`）
    pub verification: Option<Verification>,
    /// 引擎关闭结果（网络模式或未执行到时为 `None`）
    pub shutdown: Option<ShutdownOutcome>,
    /// 清理阶段关闭失败的资源数
    pub cleanup_failures: usize,
}

impl RunSummary {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
            && self.verification.as_ref().is_some_and(Verification::is_verified)
            && self.shutdown.as_ref().map_or(true, ShutdownOutcome::is_normal)
            && self.cleanup_failures == 0
    }
}

/// 主流程中途的进度
#[derive(Default)]
struct Progress {
    verification: Option<Verification>,
    shutdown: Option<ShutdownOutcome>,
}

/// 走查程序
pub struct SimpleApp<'a> {
    config: &'a Config,
    driver: &'a dyn Driver,
    reporter: &'a mut dyn Reporter,
}

impl<'a> SimpleApp<'a> {
    pub fn new(config: &'a Config, driver: &'a dyn Driver, reporter: &'a mut dyn Reporter) -> Self {
        Self {
            config,
            driver,
            reporter,
        }
    }

    /// 执行完整走查
    pub fn run(&mut self) -> RunSummary {
        let framework = self.driver.framework();
        self.reporter
            .step(&format!("SimpleApp starting in {} mode", framework));

        let mut session = Session::new();
        let mut progress = Progress::default();

        let error = self.main_flow(&mut session, &mut progress).err();
        if let Some(errors) = &error {
            self.reporter.sql_errors(errors);
        }

        let failures = session.release();
        for failure in &failures {
            self.reporter.sql_errors(&failure.errors);
        }

        RunSummary {
            framework,
            error,
            verification: progress.verification,
            shutdown: progress.shutdown,
            cleanup_failures: failures.len(),
        }
    }

    fn main_flow(&mut self, session: &mut Session, progress: &mut Progress) -> SqlResult<()> {
        let framework = self.driver.framework();
        let url = framework.connection_url(self.config)?;
        let credentials = self.config.credentials();

        let connection = timed("connect", || self.driver.connect(&url, &credentials))?;
        session.attach(connection);
        log::info!("已连接: {}", url);

        let statement = session.create_statement()?;

        timed("create table", || session.execute(statement, CREATE_TABLE))?;
        self.reporter.step("Created table location");

        let insert = session.prepare_statement(INSERT_LOCATION)?;
        for (num, addr) in INSERTS {
            timed("insert", || {
                session.execute_update(insert, &[Value::Integer(num), Value::from(addr)])
            })?;
            self.reporter
                .step(&format!("Inserted {} {}", num, street(addr)));
        }

        let update = session.prepare_statement(UPDATE_LOCATION)?;
        for (old_num, old_addr, new_num, new_addr) in UPDATES {
            timed("update", || {
                session.execute_update(
                    update,
                    &[Value::Integer(new_num), Value::from(new_addr), Value::Integer(old_num)],
                )
            })?;
            self.reporter.step(&format!(
                "Updated {} {} to {} {}",
                old_num,
                street(old_addr),
                new_num,
                street(new_addr)
            ));
        }

        session.execute_query(statement, SELECT_LOCATIONS)?;
        let verification = timed("verify", || {
            verify_locations(|| match session.next_row()? {
                Some(row) => Location::from_row(&row).map(Some),
                None => Ok(None),
            })
        })?;
        session.close_result_set()?;

        if verification.is_verified() {
            self.reporter.step("Verified the rows");
        } else {
            for failure in &verification.failures {
                self.reporter.verification_failure(failure);
            }
        }
        progress.verification = Some(verification);

        timed("drop table", || session.execute(statement, DROP_TABLE))?;
        self.reporter.step("Dropped table location");

        timed("commit", || session.commit())?;
        self.reporter.step("Committed the transaction");

        if framework.requires_engine_shutdown() {
            let outcome = ShutdownOutcome::classify(timed("shutdown", || self.driver.shutdown()));
            match &outcome {
                ShutdownOutcome::Normal => self.reporter.step("Engine shut down normally"),
                ShutdownOutcome::Failed(errors) => {
                    self.reporter.warning("Engine did not shut down normally");
                    self.reporter.sql_errors(errors);
                }
                ShutdownOutcome::NoSignal => {
                    self.reporter.warning("Engine did not shut down normally");
                }
            }
            progress.shutdown = Some(outcome);
        }

        Ok(())
    }
}
