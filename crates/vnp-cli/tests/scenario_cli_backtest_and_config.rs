use std::fs;
use std::path::Path;

use predicates::prelude::*;

fn write(dir: &Path, name: &str, body: &str) -> String {
    let p = dir.join(name);
    fs::write(&p, body).unwrap();
    p.to_string_lossy().into_owned()
}

#[allow(deprecated)]
fn vnp() -> assert_cmd::Command {
    assert_cmd::Command::cargo_bin("vnp").unwrap()
}

const HISTORY: &str = "date,FPT,HPG,VNINDEX\n\
                       2024-01-02,100,20,1000\n\
                       2024-01-03,110,20,1010\n\
                       2024-01-04,121,22,1020\n";

#[test]
fn weight_backtest_prints_metrics_and_benchmark() {
    let dir = tempfile::tempdir().unwrap();
    let history = write(dir.path(), "prices.csv", HISTORY);
    let weights = write(dir.path(), "w.json", r#"{"FPT": 0.5, "HPG": 0.5}"#);

    vnp()
        .args(["backtest", "--history", &history, "--weights", &weights])
        .assert()
        .success()
        .stdout(predicate::str::contains("period=2024-01-03..2024-01-04"))
        .stdout(predicate::str::contains("weights.days=2\n"))
        .stdout(predicate::str::contains("weights.total_return_pct=15.5000\n"))
        .stdout(predicate::str::contains("benchmark.VNINDEX.total_return_pct=2.0000\n"))
        .stdout(predicate::str::contains("weights.beta="));
}

#[test]
fn budget_adds_holdings_backtest() {
    let dir = tempfile::tempdir().unwrap();
    let history = write(dir.path(), "prices.csv", HISTORY);
    let weights = write(dir.path(), "w.json", r#"{"FPT": 0.5, "HPG": 0.5}"#);

    let out = vnp()
        .args([
            "backtest", "--history", &history, "--weights", &weights, "--budget", "1000",
            "--json",
        ])
        .output()
        .unwrap();
    assert!(out.status.success());

    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let values = v["holdings"]["backtest"]["values"].as_array().unwrap();
    assert_eq!(values.len(), 3);
    let end = values[2].as_f64().unwrap();
    assert!((end - 1000.0).abs() < 1e-6);
    assert_eq!(v["weights"]["returns"].as_array().unwrap().len(), 2);
}

#[test]
fn unknown_weighted_ticker_is_reported_as_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let history = write(dir.path(), "prices.csv", HISTORY);
    let weights = write(dir.path(), "w.json", r#"{"FPT": 0.5, "SSI": 0.5}"#);

    vnp()
        .args(["backtest", "--history", &history, "--weights", &weights])
        .assert()
        .success()
        .stdout(predicate::str::contains("skipped=SSI\n"));
}

#[test]
fn config_hash_is_stable_across_layers() {
    let dir = tempfile::tempdir().unwrap();
    let base = write(dir.path(), "base.yaml", "backtest:\n  trading_days_per_year: 252\n");
    let over = write(dir.path(), "over.yaml", "backtest:\n  benchmarks: [VNINDEX]\n");
    let flat = write(
        dir.path(),
        "flat.yaml",
        "backtest:\n  benchmarks: [VNINDEX]\n  trading_days_per_year: 252\n",
    );

    let layered = vnp().args(["config-hash", &base, &over]).output().unwrap();
    let single = vnp().args(["config-hash", &flat]).output().unwrap();
    assert!(layered.status.success());
    assert_eq!(layered.stdout, single.stdout);

    let text = String::from_utf8(layered.stdout).unwrap();
    let hash_line = text.lines().next().unwrap();
    let hash = hash_line.strip_prefix("config_hash=").unwrap();
    assert_eq!(hash.len(), 64);
}

#[test]
fn config_hash_requires_a_path() {
    vnp()
        .arg("config-hash")
        .assert()
        .failure();
}
