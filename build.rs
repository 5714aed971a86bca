//! Stamps `SONGSMITH_BUILD` for `songsmith --version`.
//!
//! Packagers building without a git checkout can set the variable
//! themselves; otherwise `git describe` is used, marking dirty trees.

use std::process::Command;

const BUILD_VAR: &str = "SONGSMITH_BUILD";

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn main() {
    println!("cargo:rerun-if-env-changed={}", BUILD_VAR);

    let build = std::env::var(BUILD_VAR)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| git(&["describe", "--always", "--dirty", "--abbrev=8"]))
        .unwrap_or_else(|| "source build".to_string());
    println!("cargo:rustc-env={}={}", BUILD_VAR, build);

    if let Some(git_dir) = git(&["rev-parse", "--git-dir"]) {
        println!("cargo:rerun-if-changed={}/HEAD", git_dir);
        println!("cargo:rerun-if-changed={}/index", git_dir);
    }
}
