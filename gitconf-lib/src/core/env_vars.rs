//! Environment variables which affect the functioning of `gitconf`.

use std::path::PathBuf;

use tracing::instrument;

use crate::util::get_from_path;

/// Path to the Git executable to shell out to. This is mostly set during
/// tests, so that they can run against a specific Git version.
pub const TEST_GIT: &str = "TEST_GIT";

/// The name of the Git executable to search for in `PATH`.
pub const GIT_EXE_NAME: &str = if cfg!(target_os = "windows") {
    "git.exe"
} else {
    "git"
};

/// Get the path to the Git executable as set by [`TEST_GIT`].
#[instrument]
pub fn get_path_to_git() -> eyre::Result<PathBuf> {
    let path_to_git = std::env::var_os(TEST_GIT).ok_or_else(|| {
        eyre::eyre!(
            "No path to Git executable was set. \
Try running as: `{0}=$(which git) cargo test ...` \
or set `env.{0}` in your `config.toml` \
(see https://doc.rust-lang.org/cargo/reference/config.html)",
            TEST_GIT,
        )
    })?;
    let path_to_git = PathBuf::from(&path_to_git);
    Ok(path_to_git)
}

/// Resolve the Git executable to use: [`TEST_GIT`] if set, otherwise the
/// first `git` found in `PATH`, otherwise the bare name `git` (which lets
/// the operating system report the failure at spawn time).
#[instrument]
pub fn resolve_path_to_git() -> PathBuf {
    get_path_to_git()
        .ok()
        .or_else(|| get_from_path(GIT_EXE_NAME))
        .unwrap_or_else(|| PathBuf::from(GIT_EXE_NAME))
}
