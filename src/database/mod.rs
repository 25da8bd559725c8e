//! 数据库模块
//!
//! 驱动边界、两种驱动实现以及结构化错误

pub mod driver;
pub mod embedded;
pub mod error;
pub mod network;
pub mod url;

pub use driver::{Connection, Driver, ResultSetHandle, Row, StatementHandle, Value};
pub use embedded::EmbeddedDriver;
pub use error::{SqlError, SqlErrors, SqlResult, SHUTDOWN_CODE, SHUTDOWN_STATE};
pub use network::NetworkDriver;
pub use url::{ConnectionUrl, Credentials, Framework};

use crate::config::Config;

/// 按连接模式创建驱动
pub fn driver_for(framework: Framework, config: &Config) -> SqlResult<Box<dyn Driver>> {
    match framework {
        Framework::Embedded => Ok(Box::new(EmbeddedDriver::new(&config.data_dir))),
        Framework::Client => Ok(Box::new(NetworkDriver::new()?)),
    }
}
