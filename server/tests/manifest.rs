//! Dependency hygiene: crates and features nothing here uses stay out of
//! the manifests.

const SERVER: &str = include_str!("../Cargo.toml");
const CORE: &str = include_str!("../../core/Cargo.toml");

fn dependency_line<'a>(manifest: &'a str, name: &str) -> Option<&'a str> {
    let prefix = format!("{name} =");
    manifest.lines().find(|line| line.starts_with(&prefix))
}

#[test]
fn server_has_no_direct_serde() {
    assert!(dependency_line(SERVER, "serde").is_none());
    assert!(dependency_line(SERVER, "serde_json").is_some());
}

#[test]
fn serde_features_are_not_enabled_on_ids_or_dates() {
    let uuid = dependency_line(SERVER, "uuid").unwrap();
    assert!(!uuid.contains("serde"), "{uuid}");

    let chrono = dependency_line(CORE, "chrono").unwrap();
    assert!(!chrono.contains("serde"), "{chrono}");
}
