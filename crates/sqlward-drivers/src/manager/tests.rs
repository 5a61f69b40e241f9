//! Unit tests for the plugin lifecycle manager.

use std::sync::Arc;

use rstest::rstest;

use sqlward_types::{
    AuditResults, DriverConfig, DriverMetas, EstimatedAffectRows, ExecResult, ExplainResult,
    I18nStr, Node, QueryResult, TableMetaItem, SQL_KIND_DML,
};

use super::*;

struct StubDriver;

impl Driver for StubDriver {
    fn close(&mut self) {}

    fn parse(&self, sql: &str) -> Result<Vec<Node>, DriverError> {
        Ok(vec![Node::new(sql, SQL_KIND_DML, sql)])
    }

    fn audit(&self, sqls: &[String]) -> Result<Vec<AuditResults>, DriverError> {
        Ok(sqls.iter().map(|_| AuditResults::new()).collect())
    }

    fn gen_rollback_sql(&self, _sql: &str) -> Result<(String, I18nStr), DriverError> {
        Ok((String::new(), I18nStr::new()))
    }

    fn ping(&self) -> Result<(), DriverError> {
        Ok(())
    }

    fn exec(&self, _sql: &str) -> Result<ExecResult, DriverError> {
        Ok(ExecResult::new(0, 0))
    }

    fn exec_batch(&self, sqls: &[String]) -> Result<Vec<ExecResult>, DriverError> {
        Ok(sqls.iter().map(|_| ExecResult::new(0, 0)).collect())
    }

    fn tx(&self, sqls: &[String]) -> Result<Vec<ExecResult>, DriverError> {
        Ok(sqls.iter().map(|_| ExecResult::new(0, 0)).collect())
    }

    fn query(&self, _sql: &str, _timeout_seconds: u32) -> Result<QueryResult, DriverError> {
        Ok(QueryResult::default())
    }

    fn explain(&self, _sql: &str) -> Result<ExplainResult, DriverError> {
        Ok(ExplainResult::default())
    }

    fn schemas(&self) -> Result<Vec<String>, DriverError> {
        Ok(Vec::new())
    }

    fn get_table_meta_by_sql(&self, _sql: &str) -> Result<Vec<TableMetaItem>, DriverError> {
        Ok(Vec::new())
    }

    fn estimate_sql_affect_rows(&self, _sql: &str) -> Result<EstimatedAffectRows, DriverError> {
        Ok(EstimatedAffectRows::default())
    }

    fn kill_process(&self) -> Result<(), DriverError> {
        Ok(())
    }
}

struct StubFactory {
    name: &'static str,
}

impl DriverFactory for StubFactory {
    fn metas(&self) -> DriverMetas {
        DriverMetas::new(self.name, 0)
    }

    fn open(&self, _config: &DriverConfig) -> Result<Box<dyn Driver>, DriverError> {
        Ok(Box::new(StubDriver))
    }
}

fn builtin(name: &'static str) -> Arc<dyn DriverFactory> {
    Arc::new(StubFactory { name })
}

#[rstest]
fn start_without_plugin_dir_registers_builtins_only() {
    let mut manager = PluginManager::new(HostConfig::default());
    manager
        .start(vec![builtin("sqlite")])
        .expect("start succeeds");

    assert_eq!(manager.driver_names(), vec!["sqlite"]);
    let mut driver = manager
        .open("sqlite", &DriverConfig::offline(Vec::new()))
        .expect("open builtin");
    driver.ping().expect("ping builtin");
    driver.close();
}

#[rstest]
fn duplicate_builtin_name_is_registration_error() {
    let mut manager = PluginManager::new(HostConfig::default());
    let err = manager
        .start(vec![builtin("sqlite"), builtin("sqlite")])
        .expect_err("duplicate must fail");
    assert!(matches!(err, DriverError::DuplicatePlugin { ref name } if name == "sqlite"));

    // The first registration survived.
    assert_eq!(manager.driver_names(), vec!["sqlite"]);
}

#[rstest]
fn open_unknown_plugin_is_typed() {
    let manager = PluginManager::new(HostConfig::default());
    let err = match manager.open("oracle", &DriverConfig::offline(Vec::new())) {
        Ok(_) => panic!("unknown plugin"),
        Err(err) => err,
    };
    assert!(matches!(err, DriverError::PluginNotFound { ref name } if name == "oracle"));
}

#[rstest]
fn missing_plugin_dir_fails_discovery() {
    let err = discover_executables(std::path::Path::new("/nonexistent/sqlward-plugins"))
        .expect_err("must fail");
    assert!(matches!(err, DriverError::Discovery { .. }));
}

#[cfg(unix)]
mod unix {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    use rstest::rstest;

    use super::*;

    fn write_file(dir: &Path, name: &str, mode: u32) -> std::path::PathBuf {
        let path = dir.join(name);
        fs::write(&path, "#!/bin/sh\nexit 0\n").expect("write file");
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).expect("chmod");
        path
    }

    #[rstest]
    fn discovery_lists_only_executables_sorted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let zulu = write_file(dir.path(), "zulu-plugin", 0o755);
        let alpha = write_file(dir.path(), "alpha-plugin", 0o755);
        write_file(dir.path(), "README", 0o644);
        fs::create_dir(dir.path().join("pidfile")).expect("mkdir");

        let found = discover_executables(dir.path()).expect("discover");
        assert_eq!(found, vec![alpha, zulu]);
    }

    #[rstest]
    fn start_aborts_on_non_protocol_executable() {
        // The script runs but exits without ever speaking the handshake;
        // startup must fail loudly rather than skip it.
        let dir = tempfile::tempdir().expect("tempdir");
        write_file(dir.path(), "broken-plugin", 0o755);

        let config = HostConfig::default()
            .with_plugin_dir(dir.path())
            .with_call_timeout_secs(2);
        let mut manager = PluginManager::new(config);
        let err = manager.start(Vec::new()).expect_err("startup must fail");
        assert!(matches!(err, DriverError::Handshake { .. }));
        assert!(manager.driver_names().is_empty());
    }
}
