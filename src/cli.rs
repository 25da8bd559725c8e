//! 命令行参数

use clap::Parser;

use crate::database::Framework;

/// Walk through create, insert, update, verify and drop against one database
#[derive(Debug, Parser)]
#[command(name = "simple-app", version, about)]
pub struct Cli {
    /// `client` selects networked mode; anything else, or nothing, runs embedded
    pub framework: Option<String>,
}

impl Cli {
    pub fn framework(&self) -> Framework {
        Framework::from_argument(self.framework.as_deref())
    }
}
