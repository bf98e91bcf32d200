use super::*;
use std::io::Write as _;
use tempfile::tempdir;

#[test]
fn copy_to_then_copy_from_round_trips() {
    let root = tempdir().unwrap();
    let dfs = LocalDfs::new(root.path());

    let src_dir = tempdir().unwrap();
    let src = src_dir.path().join("disk.img");
    fs::write(&src, b"qcow2-bytes").unwrap();

    dfs.copy_to(&src, "vm-7/disk.img").unwrap();

    let dst_dir = tempdir().unwrap();
    let dst = dst_dir.path().join("restored.img");
    dfs.copy_from("vm-7/disk.img", &dst).unwrap();

    assert_eq!(fs::read(&dst).unwrap(), b"qcow2-bytes");
}

#[test]
fn open_for_write_then_read_round_trips() {
    let root = tempdir().unwrap();
    let dfs = LocalDfs::new(root.path());

    let mut writer = dfs.open("info/7", OpenMode::Write).unwrap();
    writer.write_all(b"persisted").unwrap();
    drop(writer);

    let mut reader = dfs.open("info/7", OpenMode::Read).unwrap();
    let mut out = String::new();
    reader.read_to_string(&mut out).unwrap();
    assert_eq!(out, "persisted");
}

#[test]
fn get_local_handle_resolves_under_the_configured_root() {
    let root = tempdir().unwrap();
    let dfs = LocalDfs::new(root.path());
    let handle = dfs.get_local_handle("vm-7/disk.img").unwrap();
    assert!(handle.starts_with(root.path()));
}
