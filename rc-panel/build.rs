use std::{env, process::Command};

/// Build values exposed to `--version`; an env var of the same name wins over git.
const BUILD_VALUES: [(&str, fn() -> String); 3] = [
    ("RC_BUILD_GIT_TAG", git_tag),
    ("RC_BUILD_GIT_COMMIT", git_commit),
    ("RC_BUILD_GIT_DIRTY", git_dirty),
];

fn main() {
    for (key, from_git) in BUILD_VALUES {
        println!("cargo:rerun-if-env-changed={key}");
        let value = env::var(key).unwrap_or_else(|_| from_git());
        println!("cargo:rustc-env={key}={value}");
    }
}

fn git_tag() -> String {
    git(&["describe", "--tags", "--exact-match"]).unwrap_or_else(|| "untagged".to_string())
}

fn git_commit() -> String {
    git(&["rev-parse", "--short=12", "HEAD"]).unwrap_or_else(|| "unknown".to_string())
}

fn git_dirty() -> String {
    let dirty = git(&["status", "--porcelain", "--untracked-files=no"])
        .is_some_and(|changes| !changes.is_empty());
    dirty.to_string()
}

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    Some(text.trim().to_string())
}
