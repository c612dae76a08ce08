//! Embeds build metadata for `pyconflict --version`.

use std::env;
use std::process::Command;

fn rustc_version() -> String {
    let rustc = env::var("RUSTC").unwrap_or_else(|_| "rustc".to_string());
    Command::new(rustc)
        .arg("--version")
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string())
        .unwrap_or_else(|| "unknown rustc".to_string())
}

fn main() {
    let target = env::var("TARGET").unwrap_or_else(|_| "unknown-target".to_string());
    let built = chrono::Utc::now().format("%Y-%m-%d");

    println!(
        "cargo:rustc-env=PYCONFLICT_LONG_VERSION={} (built {}, {}, {})",
        env::var("CARGO_PKG_VERSION").unwrap_or_default(),
        built,
        target,
        rustc_version()
    );
    println!("cargo:rerun-if-changed=Cargo.toml");
}
