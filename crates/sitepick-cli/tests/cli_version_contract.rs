#[test]
fn sitepick_version_contract() {
    let bin = assert_cmd::cargo::cargo_bin!("sitepick");
    let out = std::process::Command::new(bin)
        .args(["version"])
        .env_remove("SITEPICK_ENV_FILE")
        .output()
        .expect("run sitepick version");

    assert!(out.status.success(), "sitepick version failed");
    let s = String::from_utf8_lossy(&out.stdout);
    let v: serde_json::Value = serde_json::from_str(&s).expect("parse version json");

    assert_eq!(v["schema_version"].as_u64(), Some(1));
    assert_eq!(v["name"].as_str(), Some("sitepick"));
    assert!(!v["version"].as_str().unwrap_or("").is_empty());
}

#[test]
fn sitepick_version_text_contract() {
    assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("sitepick"))
        .args(["version", "--output", "text"])
        .env_remove("SITEPICK_ENV_FILE")
        .assert()
        .success()
        .stdout(predicates::str::starts_with("sitepick "));
}
