use super::*;
use tempfile::tempdir;

#[test]
fn load_creates_default_config_when_missing() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");

    let config = QemuConfig::load(&path).unwrap();
    assert!(path.exists());
    assert_eq!(config.migration_retries, QemuConfig::default().migration_retries);
}

#[test]
fn load_fills_defaults_for_partial_config() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[qemu]\nqemu_bin = \"/opt/qemu/bin/qemu-system-x86_64\"\n").unwrap();

    let config = QemuConfig::load(&path).unwrap();
    assert_eq!(
        config.qemu_bin,
        PathBuf::from("/opt/qemu/bin/qemu-system-x86_64")
    );
    assert_eq!(config.poll_delay, QemuConfig::default().poll_delay);
}

#[test]
fn save_then_load_round_trips() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");

    let mut config = QemuConfig::default();
    config.migration_retries = 7;
    config.max_parallel_migrations = 4;
    config.save(&path).unwrap();

    let reloaded = QemuConfig::load(&path).unwrap();
    assert_eq!(reloaded.migration_retries, 7);
    assert_eq!(reloaded.max_parallel_migrations, 4);
}
