use sqlprov::provision::resource::new_record;
use sqlprov::provision::ProvisionRequest;
use sqlprov::state::store::StateStore;
use tempfile::TempDir;

fn create_test_store() -> (TempDir, StateStore) {
    let dir = TempDir::new().unwrap();
    let store = StateStore::open(dir.path().to_str().unwrap()).unwrap();
    store.initialize().unwrap();
    (dir, store)
}

#[test]
fn test_initialize_is_idempotent() {
    let (_dir, store) = create_test_store();
    // Should not error on second init
    store.initialize().unwrap();
}

#[test]
fn test_upsert_and_get_script() {
    let (_dir, store) = create_test_store();
    assert!(store.get_script("reader").unwrap().is_none());

    let req = ProvisionRequest::new("s1", "db1", "SELECT 1").with_database("app");
    let record = new_record("reader", "proj", &req, &req.identity());
    store.upsert_script(&record).unwrap();

    let loaded = store.get_script("reader").unwrap().unwrap();
    assert_eq!(loaded, record);
    assert_eq!(loaded.id, "db1/s1");
    assert_eq!(loaded.database.as_deref(), Some("app"));
}

#[test]
fn test_upsert_keeps_created_at() {
    let (_dir, store) = create_test_store();
    let req = ProvisionRequest::new("s1", "db1", "SELECT 1");
    let record = new_record("reader", "proj", &req, &req.identity());
    store.upsert_script(&record).unwrap();

    let mut changed = record.clone();
    changed.id = "db1/s2".to_string();
    changed.name = "s2".to_string();
    changed.created_at = "2000-01-01T00:00:00Z".to_string();
    store.upsert_script(&changed).unwrap();

    let loaded = store.get_script("reader").unwrap().unwrap();
    assert_eq!(loaded.id, "db1/s2");
    assert_eq!(loaded.created_at, record.created_at);
}

#[test]
fn test_list_and_delete_scripts() {
    let (_dir, store) = create_test_store();
    for (address, name) in [("b", "s2"), ("a", "s1"), ("c", "s3")] {
        let req = ProvisionRequest::new(name, "db1", "SELECT 1");
        store
            .upsert_script(&new_record(address, "proj", &req, &req.identity()))
            .unwrap();
    }

    let addresses: Vec<String> = store
        .list_scripts()
        .unwrap()
        .into_iter()
        .map(|r| r.address)
        .collect();
    assert_eq!(addresses, vec!["a", "b", "c"]);

    assert!(store.delete_script("b").unwrap());
    assert!(!store.delete_script("b").unwrap());
    assert_eq!(store.list_scripts().unwrap().len(), 2);
}

#[test]
fn test_state_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().to_str().unwrap();
    {
        let store = StateStore::open(path).unwrap();
        store.initialize().unwrap();
        let req = ProvisionRequest::new("s1", "db1", "SELECT 1");
        store
            .upsert_script(&new_record("reader", "proj", &req, &req.identity()))
            .unwrap();
    }

    let store = StateStore::open(path).unwrap();
    store.initialize().unwrap();
    assert_eq!(store.get_script("reader").unwrap().unwrap().id, "db1/s1");
}
