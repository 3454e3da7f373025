use std::process::Command;

#[test]
fn fast_forward_run_prints_density_grid() {
    let output = Command::new(env!("CARGO_BIN_EXE_crowd-pulse"))
        .args([
            "--fast-forward",
            "--seconds",
            "2",
            "--seed",
            "11",
            "--log-filter",
            "warn",
        ])
        .output()
        .expect("failed to launch crowd-pulse binary");

    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let border = format!("+{}+", "-".repeat(75));
    assert_eq!(stdout.lines().next(), Some(border.as_str()));
    assert_eq!(stdout.lines().count(), 27);
}

#[test]
fn missing_config_file_fails_with_context() {
    let output = Command::new(env!("CARGO_BIN_EXE_crowd-pulse"))
        .args(["--fast-forward", "--config", "does/not/exist.toml"])
        .output()
        .expect("failed to launch crowd-pulse binary");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to read config"), "{stderr}");
}
