mod common;

use std::sync::Arc;

use common::{provisioner, FakeSqlAdmin};
use sqlprov::admin::types::ExecuteSqlResponse;
use sqlprov::config::parser::parse_config;
use sqlprov::config::types::ScriptSpec;
use sqlprov::config::validator::resolve_scripts;
use sqlprov::executor::parallel::{apply_plan, execute_destroy, ScriptStatus};
use sqlprov::planner::plan::{ExecutionPlan, ScriptAction};
use sqlprov::state::store::StateStore;
use tempfile::TempDir;

fn create_test_store() -> (TempDir, StateStore) {
    let dir = TempDir::new().unwrap();
    let store = StateStore::open(dir.path().to_str().unwrap()).unwrap();
    store.initialize().unwrap();
    (dir, store)
}

fn specs(yaml: &str) -> Vec<ScriptSpec> {
    resolve_scripts(&parse_config(yaml).unwrap(), None).unwrap()
}

const CONFIG: &str = r#"
project:
  name: "apply-test"
  settings:
    project: "proj"
  scripts:
    reader:
      name: "s1"
      instance: "db1"
      script: "CREATE USER IF NOT EXISTS 'reader'@'%';"
    tables:
      name: "tables"
      instance: "pg1"
      database: "appdb"
      script: "CREATE TABLE IF NOT EXISTS t1 (c INT);"
"#;

#[tokio::test]
async fn test_apply_runs_scripts_and_records_identity() {
    let (_dir, store) = create_test_store();
    let admin = FakeSqlAdmin::new()
        .with_instance("db1", "ALWAYS")
        .with_instance("pg1", "ALWAYS");
    let prov = Arc::new(provisioner(Arc::clone(&admin)));

    let plan = ExecutionPlan::build(&specs(CONFIG), &store.list_scripts().unwrap());
    assert_eq!(plan.runs().count(), 2);

    let summary = apply_plan(prov, &store, &plan, 4, &[]).await.unwrap();
    assert_eq!(summary.provisioned, 2);
    assert_eq!(summary.failed, 0);

    let reader = store.get_script("reader").unwrap().unwrap();
    assert_eq!(reader.id, "db1/s1");
    assert!(reader.database.is_none());
    assert_eq!(reader.deletion_policy, "ABANDON");

    let tables = store.get_script("tables").unwrap().unwrap();
    assert_eq!(tables.id, "pg1/tables");
    assert_eq!(tables.database.as_deref(), Some("appdb"));
}

#[tokio::test]
async fn test_second_apply_is_a_no_op() {
    let (_dir, store) = create_test_store();
    let admin = FakeSqlAdmin::new()
        .with_instance("db1", "ALWAYS")
        .with_instance("pg1", "ALWAYS");
    let prov = Arc::new(provisioner(Arc::clone(&admin)));

    let plan = ExecutionPlan::build(&specs(CONFIG), &store.list_scripts().unwrap());
    apply_plan(Arc::clone(&prov), &store, &plan, 4, &[]).await.unwrap();
    assert_eq!(admin.execs(), 2);

    let plan = ExecutionPlan::build(&specs(CONFIG), &store.list_scripts().unwrap());
    assert!(!plan.has_changes());
    apply_plan(prov, &store, &plan, 4, &[]).await.unwrap();
    assert_eq!(admin.execs(), 2);
}

#[tokio::test]
async fn test_script_change_reruns_and_rename_only_updates() {
    let (_dir, store) = create_test_store();
    let admin = FakeSqlAdmin::new()
        .with_instance("db1", "ALWAYS")
        .with_instance("pg1", "ALWAYS");
    let prov = Arc::new(provisioner(Arc::clone(&admin)));

    let plan = ExecutionPlan::build(&specs(CONFIG), &store.list_scripts().unwrap());
    apply_plan(Arc::clone(&prov), &store, &plan, 4, &[]).await.unwrap();

    let changed = CONFIG
        .replace("CREATE TABLE IF NOT EXISTS t1 (c INT);", "CREATE TABLE IF NOT EXISTS t2 (c INT);")
        .replace("name: \"s1\"", "name: \"s1-renamed\"");
    let plan = ExecutionPlan::build(&specs(&changed), &store.list_scripts().unwrap());
    let actions: Vec<&ScriptAction> = plan.scripts.iter().map(|s| &s.action).collect();
    assert_eq!(
        actions,
        vec![
            &ScriptAction::Update,
            &ScriptAction::Replace {
                changed: vec!["script"]
            },
        ]
    );

    let summary = apply_plan(prov, &store, &plan, 4, &[]).await.unwrap();
    assert_eq!(summary.changed, 1);
    assert_eq!(summary.provisioned, 1);
    assert_eq!(admin.execs(), 3);
    assert_eq!(store.get_script("reader").unwrap().unwrap().id, "db1/s1-renamed");
}

#[tokio::test]
async fn test_failed_script_is_not_recorded() {
    let (_dir, store) = create_test_store();
    let admin = FakeSqlAdmin::new()
        .with_instance("db1", "ALWAYS")
        .with_instance("pg1", "ALWAYS")
        .exec_returns(Ok(ExecuteSqlResponse::with_status(1064, "syntax error")));
    let prov = Arc::new(provisioner(Arc::clone(&admin)));

    let plan = ExecutionPlan::build(&specs(CONFIG), &store.list_scripts().unwrap());
    let summary = apply_plan(prov, &store, &plan, 4, &[]).await.unwrap();

    assert_eq!(summary.failed, 2);
    assert!(store.list_scripts().unwrap().is_empty());
    assert!(summary.results.iter().all(|r| matches!(
        &r.status,
        ScriptStatus::Failed { kind: "remote-status", message } if message.contains("syntax error")
    )));
}

#[tokio::test]
async fn test_inactive_and_missing_instances() {
    let (_dir, store) = create_test_store();
    let admin = FakeSqlAdmin::new().with_instance("db1", "NEVER");
    let prov = Arc::new(provisioner(Arc::clone(&admin)));

    let plan = ExecutionPlan::build(&specs(CONFIG), &store.list_scripts().unwrap());
    let summary = apply_plan(prov, &store, &plan, 4, &[]).await.unwrap();

    assert_eq!(admin.execs(), 0);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.absent, 1);
    assert!(store.list_scripts().unwrap().is_empty());
}

#[tokio::test]
async fn test_targets_limit_apply() {
    let (_dir, store) = create_test_store();
    let admin = FakeSqlAdmin::new()
        .with_instance("db1", "ALWAYS")
        .with_instance("pg1", "ALWAYS");
    let prov = Arc::new(provisioner(Arc::clone(&admin)));

    let plan = ExecutionPlan::build(&specs(CONFIG), &store.list_scripts().unwrap());
    let summary = apply_plan(prov, &store, &plan, 1, &["tables".to_string()])
        .await
        .unwrap();

    assert_eq!(summary.provisioned, 1);
    assert!(store.get_script("reader").unwrap().is_none());
    assert!(store.get_script("tables").unwrap().is_some());
}

#[tokio::test]
async fn test_destroy_and_removed_config_never_call_remote() {
    let (_dir, store) = create_test_store();
    let admin = FakeSqlAdmin::new()
        .with_instance("db1", "ALWAYS")
        .with_instance("pg1", "ALWAYS");
    let prov = Arc::new(provisioner(Arc::clone(&admin)));

    let plan = ExecutionPlan::build(&specs(CONFIG), &store.list_scripts().unwrap());
    apply_plan(Arc::clone(&prov), &store, &plan, 4, &[]).await.unwrap();
    let (gets, execs) = (admin.gets(), admin.execs());

    // Drop "tables" from config: the record is forgotten locally.
    let only_reader = r#"
project:
  name: "apply-test"
  settings:
    project: "proj"
  scripts:
    reader:
      name: "s1"
      instance: "db1"
      script: "CREATE USER IF NOT EXISTS 'reader'@'%';"
"#;
    let plan = ExecutionPlan::build(&specs(only_reader), &store.list_scripts().unwrap());
    let summary = apply_plan(prov, &store, &plan, 4, &[]).await.unwrap();
    assert_eq!(summary.forgotten, 1);
    assert!(store.get_script("tables").unwrap().is_none());

    let forgotten = execute_destroy(&store, &[]).unwrap();
    assert_eq!(forgotten, vec!["reader".to_string()]);
    assert!(store.list_scripts().unwrap().is_empty());

    assert_eq!(admin.gets(), gets);
    assert_eq!(admin.execs(), execs);
}

#[tokio::test]
async fn test_failed_state_write_keeps_other_records() {
    let (dir, store) = create_test_store();
    let admin = FakeSqlAdmin::new()
        .with_instance("db1", "ALWAYS")
        .with_instance("pg1", "ALWAYS");
    let prov = Arc::new(provisioner(Arc::clone(&admin)));

    // Reject the write for "reader" only, from a second connection.
    let conn = rusqlite::Connection::open(dir.path().join("state.db")).unwrap();
    conn.execute_batch(
        "CREATE TRIGGER reject_reader BEFORE INSERT ON provisioned_scripts
         WHEN NEW.address = 'reader'
         BEGIN SELECT RAISE(ABORT, 'disk I/O error'); END;",
    )
    .unwrap();
    drop(conn);

    let plan = ExecutionPlan::build(&specs(CONFIG), &store.list_scripts().unwrap());
    let summary = apply_plan(prov, &store, &plan, 4, &[]).await.unwrap();

    assert_eq!(admin.execs(), 2);
    assert_eq!(summary.provisioned, 1);
    assert_eq!(summary.failed, 1);
    let reader = summary
        .results
        .iter()
        .find(|r| r.address == "reader")
        .unwrap();
    assert!(matches!(
        &reader.status,
        ScriptStatus::Failed { kind: "state", message } if message.contains("db1/s1")
    ));

    assert!(store.get_script("reader").unwrap().is_none());
    assert_eq!(store.get_script("tables").unwrap().unwrap().id, "pg1/tables");

    let plan = ExecutionPlan::build(&specs(CONFIG), &store.list_scripts().unwrap());
    let reruns: Vec<&str> = plan.runs().map(|s| s.address.as_str()).collect();
    assert_eq!(reruns, vec!["reader"]);
}
