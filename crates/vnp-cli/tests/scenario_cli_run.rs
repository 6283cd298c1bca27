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

const BUNDLE: &str = r#"{
  "budget": 1000,
  "prices": { "A": 100, "B": 50 },
  "strategies": [
    { "strategy": "markowitz", "weights": { "A": 0.6, "B": 0.4 },
      "expected_return": 0.2, "volatility": 0.25, "sharpe": 0.8 },
    { "strategy": "hrp", "weights": { "C": 1.0 },
      "expected_return": 0.1, "volatility": 0.2, "sharpe": 0.5 }
  ]
}"#;

#[test]
fn one_failure_does_not_block_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = write(dir.path(), "bundle.json", BUNDLE);

    vnp()
        .args(["run", "--input", &bundle])
        .assert()
        .success()
        .stdout(predicate::str::contains("result strategy=markowitz allocator=integer"))
        .stdout(predicate::str::contains("shares.markowitz.A=6\n"))
        .stdout(predicate::str::contains("shares.markowitz.B=8\n"))
        .stdout(predicate::str::contains("failure strategy=hrp"))
        .stdout(predicate::str::contains("recommended=markowitz"));
}

#[test]
fn json_output_carries_comparison_and_ranking() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = write(dir.path(), "bundle.json", BUNDLE);

    let out = vnp()
        .args(["run", "--input", &bundle, "--json"])
        .output()
        .unwrap();
    assert!(out.status.success());

    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["results"].as_array().unwrap().len(), 1);
    assert_eq!(v["failures"][0]["strategy"], "hrp");
    assert_eq!(v["comparison"][0]["stock_count"], 2);
    assert_eq!(v["recommendation"][0]["strategy"], "markowitz");
    assert_eq!(v["budget"], 1000.0);
}

#[test]
fn drawdown_falls_back_to_volatility_without_history() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = write(dir.path(), "bundle.json", BUNDLE);

    vnp()
        .args(["run", "--input", &bundle])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "max_drawdown_pct=-62.50 drawdown_source=volatility_estimate",
        ));
}

#[test]
fn history_replaces_drawdown_estimate_with_backtest() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = write(dir.path(), "bundle.json", BUNDLE);
    let history = write(
        dir.path(),
        "prices.csv",
        "date,A,B\n2024-01-02,100,50\n2024-01-03,110,50\n2024-01-04,99,50\n",
    );

    let out = vnp()
        .args(["run", "--input", &bundle, "--history", &history, "--json"])
        .output()
        .unwrap();
    assert!(out.status.success());

    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let row = &v["comparison"][0];
    assert_eq!(row["drawdown_source"], "realized");
    // +6 % then −6 % on the 60 % leg.
    let dd = row["max_drawdown_pct"].as_f64().unwrap();
    assert!((dd + 6.0).abs() < 1e-6, "{dd}");
}

#[test]
fn allocator_override_from_config_applies() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = write(dir.path(), "bundle.json", BUNDLE);
    let cfg = write(
        dir.path(),
        "cfg.yaml",
        "allocation:\n  allocator_overrides:\n    markowitz: greedy\n",
    );

    vnp()
        .args(["run", "--input", &bundle, "--config", &cfg])
        .assert()
        .success()
        .stdout(predicate::str::contains("result strategy=markowitz allocator=greedy"));
}

#[test]
fn all_strategies_failing_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = write(
        dir.path(),
        "bundle.json",
        r#"{ "prices": {}, "strategies": [
              { "strategy": "hrp", "weights": { "C": 1.0 }, "expected_return": 0.1 } ] }"#,
    );

    vnp()
        .args(["run", "--input", &bundle, "--budget", "1000"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("failure strategy=hrp"))
        .stderr(predicate::str::contains("no strategy produced an allocation"));
}

#[test]
fn missing_budget_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = write(
        dir.path(),
        "bundle.json",
        r#"{ "strategies": [] }"#,
    );

    vnp()
        .args(["run", "--input", &bundle])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no budget"));
}
