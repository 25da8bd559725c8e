//! 面向用户的输出
//!
//! 步骤确认写到标准输出，诊断信息写到标准错误。
//! 走查流程只依赖 `Reporter` trait，测试中用 `Transcript` 记录输出。

use crate::database::SqlErrors;

/// 输出通道
pub trait Reporter {
    /// 一行步骤确认
    fn step(&mut self, message: &str);

    /// 数据校验失败（不中断流程）
    fn verification_failure(&mut self, message: &str);

    /// 数据库层错误的完整诊断
    fn sql_errors(&mut self, errors: &SqlErrors);

    /// 其它需要提醒用户的情况
    fn warning(&mut self, message: &str);
}

/// 按 `----- SQLException -----` 块格式化每条错误记录
pub fn format_sql_errors(errors: &SqlErrors) -> String {
    let mut out = String::new();
    for record in errors.records() {
        out.push_str("\n----- SQLException -----\n");
        out.push_str(&format!("  SQL State:  {}\n", record.state));
        out.push_str(&format!("  Error Code: {}\n", record.code));
        out.push_str(&format!("  Message:    {}\n", record.message));
    }
    out
}

/// 校验失败的两行提示
pub fn format_verification_failure(message: &str) -> String {
    format!("\nData verification failed:\n\t{}", message)
}

/// 终端输出
#[derive(Debug, Default)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn step(&mut self, message: &str) {
        println!("{}", message);
    }

    fn verification_failure(&mut self, message: &str) {
        log::warn!("数据校验失败: {}", message);
        eprintln!("{}", format_verification_failure(message));
    }

    fn sql_errors(&mut self, errors: &SqlErrors) {
        log::error!("数据库错误: {}", errors);
        eprint!("{}", format_sql_errors(errors));
    }

    fn warning(&mut self, message: &str) {
        eprintln!("{}", message);
    }
}

/// 输出事件
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Step(String),
    VerificationFailure(String),
    SqlErrors(SqlErrors),
    Warning(String),
}

/// 把输出记录在内存中
#[derive(Debug, Default)]
pub struct Transcript {
    pub events: Vec<Event>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// 所有步骤确认行
    pub fn steps(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Step(s) => Some(s.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn verification_failures(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::VerificationFailure(s) => Some(s.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn recorded_sql_errors(&self) -> Vec<&SqlErrors> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::SqlErrors(errors) => Some(errors),
                _ => None,
            })
            .collect()
    }

    pub fn warnings(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Warning(s) => Some(s.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl Reporter for Transcript {
    fn step(&mut self, message: &str) {
        self.events.push(Event::Step(message.to_string()));
    }

    fn verification_failure(&mut self, message: &str) {
        self.events.push(Event::VerificationFailure(message.to_string()));
    }

    fn sql_errors(&mut self, errors: &SqlErrors) {
        self.events.push(Event::SqlErrors(errors.clone()));
    }

    fn warning(&mut self, message: &str) {
        self.events.push(Event::Warning(message.to_string()));
    }
}
