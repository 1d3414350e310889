use std::process::Command;

#[test]
fn terminal_headless_smoke() {
    let bin = env!("CARGO_BIN_EXE_logfall");
    let mut cmd = Command::new(bin);
    cmd.arg("--test")
        .arg("--seed")
        .arg("42")
        .env("LOGFALL_TERMINAL_HEADLESS", "1")
        .env("LOGFALL_TERMINAL_HEADLESS_FRAMES", "60")
        .env("TERM", "xterm-256color")
        .env("RUST_LOG", "off");

    let status = cmd.status().expect("failed to run logfall binary");
    assert!(status.success(), "terminal headless run failed");
}
