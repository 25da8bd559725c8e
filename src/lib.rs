// 走查程序的各个模块
// 注意：database 被其余模块依赖
pub mod database;
pub mod config;
pub mod logging;
pub mod cli;
pub mod report;
pub mod session;
pub mod verification;
pub mod walkthrough;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use report::{ConsoleReporter, Reporter, Transcript};
pub use walkthrough::{RunSummary, ShutdownOutcome, SimpleApp};
