//! Embeds the git revision of the sync server as `GIT_HASH`, reported by the
//! stats endpoint and the WebSocket `connected` message.

use std::process::Command;

const UNKNOWN_REVISION: &str = "unknown";

fn short_revision() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let revision = String::from_utf8(output.stdout).ok()?;
    let revision = revision.trim();
    (!revision.is_empty()).then(|| revision.to_string())
}

fn main() {
    let revision = short_revision().unwrap_or_else(|| {
        println!("cargo:warning=kisan-sync-server: git revision unavailable, reporting '{UNKNOWN_REVISION}'");
        UNKNOWN_REVISION.to_string()
    });
    println!("cargo:rustc-env=GIT_HASH={revision}");

    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads/");
}
