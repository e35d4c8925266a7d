//! Crash consistency and tolerant loading of record files.
//!
//! A crash is simulated by leaking a `TableWriter` after it wrote the temp
//! file: the rename never happens and the temp file stays behind.

use std::fs;

use pixframe_store::codec;
use pixframe_store::storage::durable;
use pixframe_store::{Customer, DecodeError, DurableStore, Project, RecordStore, RecordTable, WorkspaceConfig};
use tempfile::tempdir;

fn customers(ids: &[u32]) -> RecordTable<Customer> {
    ids.iter()
        .map(|id| {
            let mut c = Customer::new(format!("First{id}"), "Last");
            c.customer_number = *id;
            c
        })
        .collect()
}

#[test]
fn test_crash_before_rename_keeps_original() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("customers.csv");
    let store = DurableStore::<Customer>::new(&path, true);
    store.save(&customers(&[1000, 1001])).unwrap();
    let before = fs::read(&path).unwrap();

    let mut writer = store.begin_write().unwrap();
    writer.write_table(&customers(&[1000, 1001, 1002, 1003])).unwrap();
    std::mem::forget(writer);

    assert_eq!(fs::read(&path).unwrap(), before);
    let loaded = store.load().unwrap();
    assert_eq!(loaded.table, customers(&[1000, 1001]));
}

#[test]
fn test_reopen_after_crash_discards_temp() {
    let dir = tempdir().unwrap();
    let cfg = WorkspaceConfig::new(dir.path()).without_sync();

    {
        let store: RecordStore<Customer> = RecordStore::open(cfg.customer_file_path(), &cfg).unwrap();
        store.add_or_update(Customer::new("Ana", "Silva")).unwrap();
    }
    let before = fs::read(cfg.customer_file_path()).unwrap();

    let durable = DurableStore::<Customer>::new(cfg.customer_file_path(), false);
    let mut writer = durable.begin_write().unwrap();
    writer.write_table(&customers(&[1000, 1001, 1002])).unwrap();
    std::mem::forget(writer);
    assert!(durable.temp_path().exists());

    let store: RecordStore<Customer> = RecordStore::open(cfg.customer_file_path(), &cfg).unwrap();
    assert!(!durable.temp_path().exists());
    assert_eq!(fs::read(cfg.customer_file_path()).unwrap(), before);
    assert_eq!(store.len(), 1);

    // The store keeps working normally afterwards.
    let saved = store.add_or_update(Customer::new("Ben", "Kraus")).unwrap();
    assert_eq!(saved.record.customer_number, 1001);
}

#[test]
fn test_tolerant_load_skips_one_malformed_row() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("customers.csv");
    let mut content = format!("{}\n", codec::header::<Customer>());
    for id in 1000..1005 {
        content.push_str(&format!("{id},First,Last,,,,,,,,,\n"));
        if id == 1002 {
            content.push_str("1099,Too,Few\n");
        }
    }
    fs::write(&path, content).unwrap();

    let report = durable::load::<Customer>(&path).unwrap();
    assert_eq!(report.table.len(), 5);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(
        report.skipped[0].error,
        DecodeError::TooFewColumns { found: 3, required: 11 }
    );
    assert_eq!(report.skipped[0].line, 5);
}

#[test]
fn test_quoted_fields_survive_reopen() {
    let dir = tempdir().unwrap();
    let cfg = WorkspaceConfig::new(dir.path()).without_sync();

    let mut customer = Customer::new("Ana", "Silva, geb. \"Costa\"");
    customer.company = "Studio A, B & C".to_string();
    customer.street = "Hauptstr.\nHinterhaus".to_string();
    customer.city = "Köln\r\nDeutz".to_string();

    let id = {
        let store: RecordStore<Customer> = RecordStore::open(cfg.customer_file_path(), &cfg).unwrap();
        store.add_or_update(customer.clone()).unwrap().record.customer_number
    };

    let store: RecordStore<Customer> = RecordStore::open(cfg.customer_file_path(), &cfg).unwrap();
    let loaded = store.get(id).unwrap();
    assert_eq!(loaded.last_name, customer.last_name);
    assert_eq!(loaded.company, customer.company);
    assert_eq!(loaded.street, customer.street);
    assert_eq!(loaded.city, "Köln\r\nDeutz");
    assert!(store.skipped().is_empty());
}

#[test]
fn test_legacy_project_rows_upgrade_on_save() {
    let dir = tempdir().unwrap();
    let cfg = WorkspaceConfig::new(dir.path()).without_sync();
    fs::create_dir_all(cfg.data_path()).unwrap();
    fs::write(
        cfg.project_file_path(),
        "ProjectId,CustomerNumber,ProjectName,Description,CreatedDate,Deadline,Status,ProjectFolderPath,Notes\n\
         1,1000,Hochzeit,Kirche und Feier,2023-05-01 10:00:00,2023-08-12 00:00:00,Aktiv,,Anzahlung offen\n\
         2,1001,Portrait,,2023-06-01 09:30:00,,Abgeschlossen,,\n",
    )
    .unwrap();

    let store: RecordStore<Project> = RecordStore::open(cfg.project_file_path(), &cfg).unwrap();
    let wedding = store.get(1).unwrap();
    assert_eq!(wedding.notes, "Kirche und Feier\nAnzahlung offen");
    assert!(wedding.booking.is_some());
    assert!(!wedding.photography);
    assert_eq!(store.get(2).unwrap().status, "Abgeschlossen");

    store.delete(2).unwrap();
    let text = fs::read_to_string(cfg.project_file_path()).unwrap();
    assert!(text.starts_with(&format!("{}\n", codec::header::<Project>())));

    let reopened: RecordStore<Project> = RecordStore::open(cfg.project_file_path(), &cfg).unwrap();
    assert_eq!(reopened.get(1).unwrap(), wedding);
}
