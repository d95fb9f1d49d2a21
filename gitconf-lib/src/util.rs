//! Utility functions.

use std::fmt::Display;
use std::num::TryFromIntError;
use std::path::PathBuf;
use std::process::ExitStatus;

/// Represents the code to exit the process with.
#[must_use]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ExitCode(pub isize);

impl ExitCode {
    /// Return an exit code corresponding to success.
    pub fn success() -> Self {
        Self(0)
    }

    /// Determine whether or not this exit code represents a successful
    /// termination.
    pub fn is_success(&self) -> bool {
        match self {
            ExitCode(0) => true,
            ExitCode(_) => false,
        }
    }
}

impl Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<ExitStatus> for ExitCode {
    type Error = TryFromIntError;

    fn try_from(status: ExitStatus) -> Result<Self, Self::Error> {
        // On Unix, if the child process was terminated by a signal, we need to
        // call some Unix-specific functions to access the signal that
        // terminated it. For simplicity, just return `1` in those cases.
        let exit_code = status.code().unwrap_or(1);
        Ok(Self(exit_code.try_into()?))
    }
}

/// Encapsulate both an `eyre::Error` and an `ExitCode`. The `eyre::Error`
/// indicates a failure of the program itself, while the `ExitCode` is the
/// intended result of a subcommand which ran to completion (such as a miss
/// when looking up a config key).
pub type EyreExitOr<T> = eyre::Result<Result<T, ExitCode>>;

/// Returns a path for a given file, searching through PATH to find it.
pub fn get_from_path(exe_name: &str) -> Option<PathBuf> {
    std::env::var_os("PATH").and_then(|paths| {
        std::env::split_paths(&paths).find_map(|dir| {
            let exe_path = dir.join(exe_name);
            if exe_path.is_file() {
                Some(exe_path)
            } else {
                None
            }
        })
    })
}
