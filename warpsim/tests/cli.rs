use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_short_campaign_runs() {
    let mut cmd = Command::cargo_bin("warpsim").unwrap();
    cmd.args(["--ticks", "5", "--players", "2", "--planets", "8"])
        .assert()
        .success();
}

#[test]
fn test_save_round_trip() {
    let dir = std::env::temp_dir().join("warpsim-cli-test");
    std::fs::create_dir_all(&dir).unwrap();
    let save_path = dir.join("campaign.json");

    Command::cargo_bin("warpsim")
        .unwrap()
        .args(["--ticks", "3", "--players", "2", "--planets", "8"])
        .arg("--save")
        .arg(&save_path)
        .assert()
        .success();

    assert!(save_path.exists());

    // Resume from the snapshot
    Command::cargo_bin("warpsim")
        .unwrap()
        .args(["--ticks", "2"])
        .arg("--load")
        .arg(&save_path)
        .assert()
        .success();

    std::fs::remove_file(&save_path).ok();
}

#[test]
fn test_rejects_single_player() {
    Command::cargo_bin("warpsim")
        .unwrap()
        .args(["--players", "1", "--ticks", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least 2 players"));
}
