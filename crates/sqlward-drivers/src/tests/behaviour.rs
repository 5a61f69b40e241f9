//! End-to-end scenarios: audit flows, capability degradation, crash
//! recovery, and lifecycle invariants.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rstest::rstest;

use sqlward_types::{OptionalModule, RuleLevel};
use sqlward_wire::testkit::FakePluginSpec;

use super::{demo_config, manager_with_fake};
use crate::error::DriverError;
use crate::process::Launcher;
use crate::testkit::FakeLauncher;

/// Waits until the fake plugin thread has observed its own exit.
fn settle() {
    thread::sleep(Duration::from_millis(50));
}

// ---------------------------------------------------------------------------
// Audit scenarios
// ---------------------------------------------------------------------------

#[rstest]
fn v2_audit_flags_select_star() {
    let (manager, _launcher) = manager_with_fake(FakePluginSpec::v2("mysql"));
    let mut driver = manager.open("mysql", &demo_config()).expect("open");

    let results = driver
        .audit(&["select * from t".to_owned()])
        .expect("audit");
    assert_eq!(results.len(), 1);
    let statement = results.first().expect("one statement");
    assert_eq!(statement.level(), RuleLevel::Error);
    assert_eq!(statement.results().len(), 1);
    let finding = statement.results().first().expect("one finding");
    assert_eq!(finding.rule_name(), "rule_select_star");
    assert_eq!(finding.message().default_text(), "select star is forbidden");
    assert_eq!(
        statement.render_message(),
        "[error]select star is forbidden"
    );

    driver.close();
}

#[rstest]
fn v2_audit_stays_quiet_below_column_threshold() {
    let (manager, _launcher) = manager_with_fake(FakePluginSpec::v2("mysql"));
    let driver = manager.open("mysql", &demo_config()).expect("open");

    let results = driver
        .audit(&["create table t (c1 int, c2 int)".to_owned()])
        .expect("audit");
    let statement = results.first().expect("one statement");
    assert!(!statement.has_results());
    assert_eq!(statement.level(), RuleLevel::Null);
}

#[rstest]
fn v2_audit_preserves_batch_order() {
    let (manager, _launcher) = manager_with_fake(FakePluginSpec::v2("mysql"));
    let driver = manager.open("mysql", &demo_config()).expect("open");

    let batch = vec![
        "create table t (c1 int)".to_owned(),
        "select * from t".to_owned(),
        "insert into t values (1)".to_owned(),
    ];
    let results = driver.audit(&batch).expect("audit");
    let levels: Vec<RuleLevel> = results.iter().map(sqlward_types::AuditResults::level).collect();
    assert_eq!(levels, vec![RuleLevel::Null, RuleLevel::Error, RuleLevel::Null]);
}

#[rstest]
fn v1_audit_lifts_flat_findings() {
    let (manager, _launcher) = manager_with_fake(FakePluginSpec::v1("mysql-legacy"));
    let driver = manager.open("mysql-legacy", &demo_config()).expect("open");

    let results = driver
        .audit(&["select * from t".to_owned(), "select 1".to_owned()])
        .expect("audit");
    assert_eq!(results.len(), 2);
    let first = results.first().expect("first statement");
    assert_eq!(first.level(), RuleLevel::Error);
    let second = results.get(1).expect("second statement");
    assert_eq!(second.level(), RuleLevel::Null);
}

// ---------------------------------------------------------------------------
// Capability negotiation
// ---------------------------------------------------------------------------

#[rstest]
fn v1_missing_query_service_degrades_to_typed_error() {
    let spec = FakePluginSpec {
        has_query_service: false,
        ..FakePluginSpec::v1("mysql-legacy")
    };
    let (manager, _launcher) = manager_with_fake(spec);

    // The capability flag is recorded at registration.
    assert!(!manager.is_optional_module_enabled("mysql-legacy", OptionalModule::Query));
    assert!(manager.is_optional_module_enabled("mysql-legacy", OptionalModule::Explain));

    // A query call fails fast with a typed error, no wire call attempted.
    let driver = manager.open("mysql-legacy", &demo_config()).expect("open");
    let err = driver.query("select 1", 0).expect_err("must degrade");
    assert!(matches!(
        err,
        DriverError::ModuleNotImplemented {
            module: OptionalModule::Query,
            ..
        }
    ));

    // The mandatory service keeps working.
    driver.ping().expect("ping still works");
}

#[rstest]
fn v2_declares_capabilities_without_probing() {
    let spec = FakePluginSpec {
        enabled_modules: vec![OptionalModule::Query],
        ..FakePluginSpec::v2("narrow")
    };
    let (manager, _launcher) = manager_with_fake(spec);
    let driver = manager.open("narrow", &demo_config()).expect("open");

    driver.query("select 1", 0).expect("declared module works");
    let err = driver.explain("select 1").expect_err("undeclared module");
    assert!(matches!(
        err,
        DriverError::ModuleNotImplemented {
            module: OptionalModule::Explain,
            ..
        }
    ));
}

// ---------------------------------------------------------------------------
// Composed and pass-through operations
// ---------------------------------------------------------------------------

#[rstest]
fn v2_table_meta_is_composed_from_extraction() {
    let (manager, _launcher) = manager_with_fake(FakePluginSpec::v2("mysql"));
    let driver = manager.open("mysql", &demo_config()).expect("open");

    let items = driver
        .get_table_meta_by_sql("select a from orders join users on 1=1")
        .expect("table meta");
    let names: Vec<&str> = items.iter().map(|i| i.table.name.as_str()).collect();
    assert_eq!(names, vec!["orders", "users"]);
    let first = items.first().expect("first item");
    assert_eq!(first.meta.create_table_sql, "CREATE TABLE orders (id int)");
}

#[rstest]
fn v1_table_meta_is_a_single_rpc() {
    let (manager, _launcher) = manager_with_fake(FakePluginSpec::v1("mysql-legacy"));
    let driver = manager.open("mysql-legacy", &demo_config()).expect("open");

    let items = driver
        .get_table_meta_by_sql("select a from orders")
        .expect("table meta");
    assert_eq!(items.len(), 1);
    assert_eq!(
        items.first().expect("item").table.name,
        "orders"
    );
}

#[rstest]
fn facade_operations_pass_through() {
    let (manager, _launcher) = manager_with_fake(FakePluginSpec::v2("mysql"));
    let driver = manager.open("mysql", &demo_config()).expect("open");

    let nodes = driver.parse("select 1; create table t (a int)").expect("parse");
    assert_eq!(nodes.len(), 2);

    let exec = driver.exec("insert into t values (1)").expect("exec");
    assert_eq!(exec.rows_affected, 1);

    let batch = driver
        .tx(&["insert into t values (1)".to_owned(), "delete from t".to_owned()])
        .expect("tx");
    assert_eq!(batch.len(), 2);

    let schemas = driver.schemas().expect("schemas");
    assert_eq!(schemas, vec!["app_db"]);

    let estimate = driver.estimate_sql_affect_rows("delete from t").expect("estimate");
    assert_eq!(estimate.count, 42);

    let (rollback, reason) = driver.gen_rollback_sql("delete from t").expect("rollback");
    assert!(rollback.is_empty());
    assert_eq!(reason.default_text(), "rollback not generated");

    driver.kill_process().expect("kill process");
}

// ---------------------------------------------------------------------------
// Crash recovery
// ---------------------------------------------------------------------------

#[rstest]
fn v2_crash_triggers_one_respawn_and_resets_sessions() {
    // Metas is call 1, Init call 2, Ping call 3; the fake exits after 3.
    let spec = FakePluginSpec {
        exit_after_calls: Some(3),
        ..FakePluginSpec::v2("mysql")
    };
    let (manager, launcher) = manager_with_fake(spec);

    let driver = manager.open("mysql", &demo_config()).expect("open");
    driver.ping().expect("last call before the crash");
    settle();

    // The next call finds the process dead: exactly one respawn happens,
    // and the stale session fails deterministically.
    let err = driver.ping().expect_err("stale session must fail");
    assert!(matches!(err, DriverError::SessionReset { ref plugin } if plugin == "mysql"));
    assert_eq!(launcher.launches(), 2);

    // A repeated call on the stale session does not respawn again.
    let err = driver.ping().expect_err("still stale");
    assert!(matches!(err, DriverError::SessionReset { .. }));
    assert_eq!(launcher.launches(), 2);

    // Re-opening binds a fresh session on the replacement process.
    let revived = manager.open("mysql", &demo_config()).expect("re-open");
    revived.ping().expect("fresh session works");
}

#[rstest]
fn v2_failed_respawn_is_deterministic() {
    let spec = FakePluginSpec {
        exit_after_calls: Some(3),
        ..FakePluginSpec::v2("mysql")
    };
    let mut manager = crate::manager::PluginManager::new(crate::config::HostConfig::default());
    let launcher = Arc::new(FakeLauncher::new(spec).with_max_launches(1));
    manager
        .install_plugin(Arc::clone(&launcher) as Arc<dyn Launcher>)
        .expect("install");

    let driver = manager.open("mysql", &demo_config()).expect("open");
    driver.ping().expect("last call before the crash");
    settle();

    let err = driver.ping().expect_err("respawn must fail");
    assert!(matches!(err, DriverError::Reconnect { ref plugin, .. } if plugin == "mysql"));
}

#[rstest]
fn v2_sessions_share_one_process() {
    let (manager, launcher) = manager_with_fake(FakePluginSpec::v2("mysql"));

    let first = manager.open("mysql", &demo_config()).expect("open first");
    let second = manager.open("mysql", &demo_config()).expect("open second");
    first.ping().expect("first session");
    second.ping().expect("second session");

    // Both sessions ran on the single registration-time launch.
    assert_eq!(launcher.launches(), 1);
}

#[rstest]
fn v1_opens_are_independent_processes() {
    let (manager, launcher) = manager_with_fake(FakePluginSpec::v1("mysql-legacy"));
    assert_eq!(launcher.launches(), 1, "probe launch");

    let first = manager.open("mysql-legacy", &demo_config()).expect("open first");
    let second = manager.open("mysql-legacy", &demo_config()).expect("open second");
    assert_eq!(launcher.launches(), 3, "one fresh process per open");
    first.ping().expect("first driver");
    second.ping().expect("second driver");
}

// ---------------------------------------------------------------------------
// Lifecycle invariants
// ---------------------------------------------------------------------------

#[rstest]
fn duplicate_plugin_names_reject_the_second() {
    let (mut manager, _launcher) = manager_with_fake(FakePluginSpec::v2("mysql"));

    let second = Arc::new(FakeLauncher::new(FakePluginSpec::v2("mysql")));
    let err = manager
        .install_plugin(second as Arc<dyn Launcher>)
        .expect_err("duplicate must fail");
    assert!(matches!(err, DriverError::DuplicatePlugin { ref name } if name == "mysql"));

    // The first registration still serves opens.
    assert_eq!(manager.driver_names(), vec!["mysql"]);
    manager
        .open("mysql", &demo_config())
        .expect("original still opens");
}

#[rstest]
fn close_is_idempotent() {
    let (manager, _launcher) = manager_with_fake(FakePluginSpec::v2("mysql"));
    let mut driver = manager.open("mysql", &demo_config()).expect("open");
    driver.close();
    driver.close();
}

#[rstest]
fn stop_is_idempotent_and_kills_the_shared_process() {
    let (manager, _launcher) = manager_with_fake(FakePluginSpec::v2("mysql"));
    let driver = manager.open("mysql", &demo_config()).expect("open");

    manager.stop();
    manager.stop();
    settle();

    // Calls after stop fail (reconnect is attempted against a fake whose
    // launcher still works, so the stale session is reported).
    let err = driver.ping().expect_err("stopped plugin");
    assert!(matches!(
        err,
        DriverError::SessionReset { .. } | DriverError::Reconnect { .. }
    ));
}

#[rstest]
fn registry_snapshot_reflects_declared_rules() {
    let (manager, _launcher) = manager_with_fake(FakePluginSpec::v2("mysql"));
    let rules = manager.all_rules();
    let mysql_rules = rules.get("mysql").expect("mysql rules");
    let names: Vec<&str> = mysql_rules.iter().map(sqlward_types::Rule::name).collect();
    assert_eq!(names, vec!["rule_select_star", "rule_too_many_columns"]);
}
