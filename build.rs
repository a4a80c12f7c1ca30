//! Build script for diffbot - embeds version information.
//!
//! Produces `BUILD_INFO_HUMAN`, consumed by clap's `--version` output:
//! the Cargo package version, `git describe` output when available, and
//! the rustc version.

use std::process::Command;

fn main() {
    ["src", "build.rs", "Cargo.toml", "Cargo.lock"]
        .iter()
        .for_each(|path| println!("cargo:rerun-if-changed={path}"));

    let build_info = build_info_human();
    println!("cargo:rustc-env=BUILD_INFO_HUMAN={build_info}");
}

/// Runs a command and returns trimmed stdout on success.
fn command_output(program: &str, args: &[&str]) -> Option<String> {
    Command::new(program)
        .args(args)
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn build_info_human() -> String {
    let components = [
        Some(env!("CARGO_PKG_VERSION").to_string()),
        command_output("git", &["describe", "--tags", "--always", "--dirty"])
            .map(|desc| format!("({desc})")),
        command_output("rustc", &["--version"]),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>();

    components.join(" ")
}
