//! Runs of the `devnet-harness` binary itself.

use super::harness::TestHarness;
use std::process::Output;
use tokio::process::Command;

const WASHERE_HEX: &str = "0x77617368657265";

async fn run_cli(harness: &TestHarness, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_devnet-harness"))
        .args(args)
        .current_dir(harness.dir())
        .env_remove("RUST_LOG")
        .env_remove("DEVNET_HARNESS_CONFIG")
        .env_remove("DEVNET_NODE_BINARY")
        .output()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_cli_rejects_four_nodes() {
    let harness = TestHarness::setup(3).await;
    let binary = harness.binary().to_str().unwrap().to_string();

    let output = run_cli(&harness, &["--num", "4", "--path", &binary]).await;

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("must use 3, 6, or 9 nodes"), "{stderr}");
    assert!(harness.invocations().is_empty());
    assert!(harness.files_with_prefix("log_").is_empty());
    assert!(harness.files_with_prefix("err_").is_empty());
}

#[tokio::test]
async fn test_cli_requires_num() {
    let harness = TestHarness::setup(3).await;
    let output = run_cli(&harness, &[]).await;
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--num"));
}

#[tokio::test]
async fn test_cli_full_run_reports_propagation() {
    let harness = TestHarness::setup(3).await;
    let settings = harness.write_settings(&harness.config(3));
    let manifest = harness.dir().join("manifest.json");

    let output = run_cli(
        &harness,
        &[
            "--num",
            "3",
            "--connect",
            "--submit-node",
            "1",
            "--harness-config",
            settings.to_str().unwrap(),
            "--manifest",
            manifest.to_str().unwrap(),
            "--require-propagation",
        ],
    )
    .await;

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        output.status.success(),
        "stdout: {stdout}\nstderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    for i in 0..3 {
        assert!(stdout.contains(&format!("got storage from node {i}: 0x\n")), "{stdout}");
        assert!(
            stdout.contains(&format!("got storage from node {i}: {WASHERE_HEX}")),
            "{stdout}"
        );
    }
    assert!(stdout.contains("submitted extrinsic to node 1"), "{stdout}");
    assert!(stdout.contains("response: {"), "{stdout}");
    assert_eq!(harness.rpc.nodes_called("author_submitExtrinsic"), vec![1]);

    let manifest: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&manifest).unwrap()).unwrap();
    assert_eq!(manifest["connect"], true);
    assert!(manifest["bootnode"].as_str().unwrap().ends_with("/p2p/12D3KooWFakeBootnodePeerId"));

    // Every started node was killed before the binary exited.
    for start in harness.starts() {
        assert!(!super::harness::is_alive(start.pid), "{start:?}");
    }
}

#[tokio::test]
async fn test_cli_require_propagation_fails_when_value_missing() {
    let harness = TestHarness::setup_with(
        3,
        super::fake_rpc::FakeRpcConfig {
            propagation_delay: std::time::Duration::from_secs(60),
            ..super::fake_rpc::FakeRpcConfig::default()
        },
    )
    .await;
    let mut config = harness.config(3);
    config.poll_retry.max_attempts = 2;
    let settings = harness.write_settings(&config);

    let args = ["--num", "3", "--harness-config", settings.to_str().unwrap()];
    let lenient = run_cli(&harness, &args).await;
    assert!(lenient.status.success());

    let mut strict = args.to_vec();
    strict.push("--require-propagation");
    let output = run_cli(&harness, &strict).await;
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("value did not propagate"), "{stderr}");
}
