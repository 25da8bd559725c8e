use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use simple_app::cli::Cli;
use simple_app::database::driver_for;
use simple_app::{logging, Config, ConsoleReporter, Reporter, SimpleApp};

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // 加载配置并初始化日志
    let config = Config::load().context("加载配置失败")?;
    logging::init(config.log_level);

    let framework = cli.framework();
    let driver = driver_for(framework, &config).context("创建数据库驱动失败")?;

    let mut reporter = ConsoleReporter;
    let summary = SimpleApp::new(&config, driver.as_ref(), &mut reporter).run();
    reporter.step("SimpleApp finished");

    log::debug!("运行结果: {:?}", summary);
    Ok(if summary.succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
