use super::*;
use std::collections::HashMap;
use tempfile::tempdir;

fn sample(pid: i32) -> PersistedVmRecord {
    PersistedVmRecord {
        schema_version: 1,
        instance: crate::types::Instance {
            memory_mb: 512,
            cores: 1,
            disks: vec![],
            nics: vec![],
            hints: HashMap::new(),
        },
        pid,
        pty_file: Some(PathBuf::from("/dev/pts/7")),
    }
}

#[test]
fn save_then_scan_round_trips() {
    let dir = tempdir().unwrap();
    let store = InfoStore::new(dir.path()).unwrap();
    store.save(101, &sample(101)).unwrap();
    store.save(102, &sample(102)).unwrap();

    let mut scanned = store.scan().unwrap();
    scanned.sort_by_key(|(id, _)| *id);
    assert_eq!(scanned.len(), 2);
    assert_eq!(scanned[0].0, 101);
    assert_eq!(scanned[1].0, 102);
}

#[test]
fn remove_deletes_the_file() {
    let dir = tempdir().unwrap();
    let store = InfoStore::new(dir.path()).unwrap();
    store.save(5, &sample(5)).unwrap();
    store.remove(5).unwrap();
    assert!(store.scan().unwrap().is_empty());
}

#[test]
fn remove_on_absent_record_is_not_an_error() {
    let dir = tempdir().unwrap();
    let store = InfoStore::new(dir.path()).unwrap();
    store.remove(999).unwrap();
}

#[test]
fn scan_skips_non_vm_id_filenames_without_aborting() {
    let dir = tempdir().unwrap();
    let store = InfoStore::new(dir.path()).unwrap();
    store.save(7, &sample(7)).unwrap();
    fs::write(dir.path().join("not-a-pid"), b"garbage").unwrap();

    let scanned = store.scan().unwrap();
    assert_eq!(scanned.len(), 1);
    assert_eq!(scanned[0].0, 7);
}

#[test]
fn scan_skips_corrupt_records_without_aborting() {
    let dir = tempdir().unwrap();
    let store = InfoStore::new(dir.path()).unwrap();
    store.save(7, &sample(7)).unwrap();
    fs::write(dir.path().join("13"), b"{not json").unwrap();

    let scanned = store.scan().unwrap();
    assert_eq!(scanned.len(), 1);
    assert_eq!(scanned[0].0, 7);
}

#[test]
fn scan_skips_records_whose_pid_does_not_match_the_filename() {
    let dir = tempdir().unwrap();
    let store = InfoStore::new(dir.path()).unwrap();
    store.save(7, &sample(7)).unwrap();
    // Write a record under filename 13 whose pid field says 99.
    store.save(13, &sample(99)).unwrap();

    let scanned = store.scan().unwrap();
    assert_eq!(scanned.len(), 1);
    assert_eq!(scanned[0].0, 7);
}
