//! 嵌入式数据库上的完整走查测试
//!
//! 每个测试使用独立的临时目录作为数据目录

#[cfg(test)]
mod tests {
    use simple_app::database::{Connection, ConnectionUrl, Credentials, Driver, EmbeddedDriver};
    use simple_app::{Config, ShutdownOutcome, SimpleApp, Transcript};
    use tempfile::TempDir;

    /// 创建指向临时目录的配置
    fn create_test_config(dir: &TempDir) -> Config {
        Config {
            data_dir: dir.path().to_path_buf(),
            ..Config::default()
        }
    }

    fn connect(driver: &EmbeddedDriver, config: &Config) -> Box<dyn Connection> {
        let url = ConnectionUrl::new("sqlite:", &config.database).with_attribute("create", "true");
        driver
            .connect(&url, &Credentials::default())
            .expect("Failed to connect")
    }

    #[test]
    fn test_full_walkthrough_embedded() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let config = create_test_config(&dir);
        let driver = EmbeddedDriver::new(dir.path());
        let mut transcript = Transcript::new();

        let summary = SimpleApp::new(&config, &driver, &mut transcript).run();

        assert_eq!(
            transcript.steps(),
            vec![
                "SimpleApp starting in embedded mode",
                "Created table location",
                "Inserted 1956 Webster",
                "Inserted 1910 Union",
                "Updated 1956 Webster to 180 Grand",
                "Updated 180 Grand to 300 Lakeshore",
                "Verified the rows",
                "Dropped table location",
                "Committed the transaction",
                "Engine shut down normally",
            ]
        );
        assert!(transcript.recorded_sql_errors().is_empty(), "{:?}", transcript.recorded_sql_errors());
        assert!(transcript.verification_failures().is_empty());
        assert_eq!(summary.shutdown, Some(ShutdownOutcome::Normal));
        assert!(summary.succeeded());
        assert!(driver.database_path(&config.database).exists());
    }

    #[test]
    fn test_table_is_dropped_and_walkthrough_repeatable() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let config = create_test_config(&dir);

        for _ in 0..2 {
            let driver = EmbeddedDriver::new(dir.path());
            let mut transcript = Transcript::new();
            let summary = SimpleApp::new(&config, &driver, &mut transcript).run();
            assert!(summary.succeeded(), "{:?}", transcript.events);
        }

        let driver = EmbeddedDriver::new(dir.path());
        let mut conn = connect(&driver, &config);
        let stmt = conn.create_statement().unwrap();
        let rs = conn
            .execute_query(
                stmt,
                "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = 'location'",
            )
            .unwrap();
        let count = conn.next_row(rs).unwrap().unwrap().get_int(0).unwrap();
        assert_eq!(count, 0);
        conn.close().unwrap();
    }

    #[test]
    fn test_existing_table_aborts_before_inserts() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let config = create_test_config(&dir);

        {
            let driver = EmbeddedDriver::new(dir.path());
            let mut conn = connect(&driver, &config);
            let stmt = conn.create_statement().unwrap();
            conn.execute(stmt, "create table location(num int, addr varchar(40))")
                .unwrap();
            conn.commit().unwrap();
            conn.close_statement(stmt).unwrap();
            conn.close().unwrap();
        }

        let driver = EmbeddedDriver::new(dir.path());
        let mut transcript = Transcript::new();
        let summary = SimpleApp::new(&config, &driver, &mut transcript).run();

        assert_eq!(transcript.steps(), vec!["SimpleApp starting in embedded mode"]);
        let errors = transcript.recorded_sql_errors();
        assert_eq!(errors.len(), 1);
        let record = errors[0].first();
        assert!(record.message.contains("already exists"));
        assert_eq!(record.state, "42X00");
        assert_eq!(record.code, 1);
        assert_eq!(summary.cleanup_failures, 0);
        assert!(summary.verification.is_none());
        assert!(summary.shutdown.is_none());
        assert!(!summary.succeeded());
    }

    #[test]
    fn test_rows_after_updates_in_order() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let config = create_test_config(&dir);
        let driver = EmbeddedDriver::new(dir.path());
        let mut conn = connect(&driver, &config);

        let stmt = conn.create_statement().unwrap();
        conn.execute(stmt, "create table location(num int, addr varchar(40))")
            .unwrap();
        let insert = conn.prepare_statement("insert into location values (?, ?)").unwrap();
        conn.execute_update(insert, &[1956.into(), "Webster St.".into()]).unwrap();
        conn.execute_update(insert, &[1910.into(), "Union St.".into()]).unwrap();
        let update = conn
            .prepare_statement("update location set num=?, addr=? where num=?")
            .unwrap();
        assert_eq!(
            conn.execute_update(update, &[180.into(), "Grand Ave.".into(), 1956.into()])
                .unwrap(),
            1
        );
        assert_eq!(
            conn.execute_update(update, &[300.into(), "Lakeshore Ave.".into(), 180.into()])
                .unwrap(),
            1
        );

        let rs = conn
            .execute_query(stmt, "SELECT num, addr FROM location ORDER BY num")
            .unwrap();
        let mut rows = Vec::new();
        while let Some(row) = conn.next_row(rs).unwrap() {
            rows.push((row.get_int(0).unwrap(), row.get_string(1).unwrap()));
        }
        assert_eq!(
            rows,
            vec![
                (300, "Lakeshore Ave.".to_string()),
                (1910, "Union St.".to_string()),
            ]
        );
        conn.close().unwrap();
    }
}
