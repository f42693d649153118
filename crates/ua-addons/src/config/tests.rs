use super::*;
use std::fs;

fn write_default_config(root: &Path, body: &str) {
    let path = root.join(REL_CONFIG_PATH);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("mkdir");
    }
    fs::write(&path, body).expect("write config");
}

#[test]
fn missing_default_config_uses_builtins() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let settings = Settings::load(tmp.path(), None).expect("load");
    assert_eq!(settings.fallback_kernel, "linux-image-generic");
    assert_eq!(
        settings
            .kernel_floors
            .minimum(Service::Livepatch, "trusty")
            .map(ToString::to_string),
        Some("4.4".to_string())
    );
    assert!(
        settings
            .kernel_floors
            .minimum(Service::Fips, "xenial")
            .is_none()
    );
    assert_eq!(settings.layout.auth_file(), tmp.path().join("etc/apt/auth.conf"));
}

#[test]
fn config_overrides_kernel_table_and_fallback() {
    let tmp = tempfile::tempdir().expect("tempdir");
    write_default_config(
        tmp.path(),
        r#"
fallback_kernel = "linux-image-virtual"

[[kernel_minimum]]
service = "livepatch"
release = "xenial"
version = "4.15"

[[kernel_minimum]]
service = "fips"
release = "xenial"
version = "4.4.0-1001"
"#,
    );
    let settings = Settings::load(tmp.path(), None).expect("load");
    assert_eq!(settings.fallback_kernel, "linux-image-virtual");
    let floors = &settings.kernel_floors;
    assert_eq!(
        floors
            .minimum(Service::Livepatch, "xenial")
            .map(ToString::to_string),
        Some("4.15".to_string())
    );
    assert_eq!(
        floors.minimum(Service::Fips, "xenial").map(ToString::to_string),
        Some("4.4.0".to_string())
    );
    assert!(floors.minimum(Service::Livepatch, "trusty").is_some());
}

#[test]
fn unknown_fields_fail_closed() {
    let tmp = tempfile::tempdir().expect("tempdir");
    write_default_config(tmp.path(), "fallback_kernal = \"typo\"\n");
    let err = Settings::load(tmp.path(), None).expect_err("must fail");
    assert_eq!(err.code(), "config.parse_failed");
}

#[test]
fn unknown_service_is_rejected() {
    let tmp = tempfile::tempdir().expect("tempdir");
    write_default_config(
        tmp.path(),
        r#"
[[kernel_minimum]]
service = "esm"
release = "trusty"
version = "3.13"
"#,
    );
    let err = Settings::load(tmp.path(), None).expect_err("must fail");
    assert_eq!(err.code(), "config.unknown_service");
}

#[test]
fn explicit_config_path_must_exist() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let err = Settings::load(tmp.path(), Some(tmp.path().join("nope.toml"))).expect_err("must fail");
    assert_eq!(err.code(), "config.read_failed");
}
