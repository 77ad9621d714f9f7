use std::io::Write;

fn classify(args: &[&str], stdin: Option<&str>) -> Vec<serde_json::Value> {
    let bin = assert_cmd::cargo::cargo_bin!("sitepick");
    let mut cmd = std::process::Command::new(bin);
    cmd.arg("classify")
        .args(args)
        .env_remove("SITEPICK_ENV_FILE")
        .env_remove("SITEPICK_CLASSIFIER")
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped());
    let mut child = cmd.spawn().expect("spawn sitepick classify");
    {
        let mut si = child.stdin.take().expect("stdin");
        if let Some(s) = stdin {
            si.write_all(s.as_bytes()).expect("write stdin");
        }
    }
    let out = child.wait_with_output().expect("wait sitepick classify");
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    String::from_utf8_lossy(&out.stdout)
        .lines()
        .map(|l| serde_json::from_str(l).expect("json line"))
        .collect()
}

#[test]
fn four_url_scenario_labels() {
    let rows = classify(
        &[
            "https://d.example/",
            "https://d.example/mt/5733",
            "https://d.example/bbs/board.php?bo_table=notice",
            "https://d.example/bbs/board.php?bo_table=notice&wr_id=5",
        ],
        None,
    );
    let labels: Vec<&str> = rows.iter().map(|r| r["label"].as_str().unwrap()).collect();
    assert_eq!(labels, vec!["LISTING", "POST", "LISTING", "POST"]);
}

#[test]
fn repeated_shapes_are_posts_unless_the_rule_is_disabled() {
    let input = (1..=5)
        .map(|i| format!("https://d.example/category/{i}\n"))
        .collect::<String>();
    let rows = classify(&["--file", "-"], Some(&input));
    assert_eq!(rows.len(), 5);
    for r in &rows {
        assert_eq!(r["label"], "POST");
        assert_eq!(r["stage"], "repeated_shape");
    }

    let rows = classify(&["--file", "-", "--no-shape-rule"], Some(&input));
    assert!(rows.iter().all(|r| r["stage"] == "post_rule"));
}

#[test]
fn duplicates_and_malformed_urls_are_skipped() {
    let rows = classify(
        &["https://d.example/a?utm_source=x", "https://d.example/a", "not a url"],
        None,
    );
    assert_eq!(rows.len(), 1);
}

#[test]
fn file_input_is_read_line_by_line() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("urls.txt");
    std::fs::write(&p, "# comment\nhttps://d.example/\n\nhttps://d.example/free\n").unwrap();
    let rows = classify(&["--file", p.to_str().unwrap()], None);
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r["label"] == "LISTING"));
}
