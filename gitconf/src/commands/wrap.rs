//! Run a user-provided Git command, showing its output as it is produced.

use lib::git::{Error, GitRunInfo};
use lib::util::EyreExitOr;
use tracing::instrument;

/// Run Git with `args`. Git's own output already reached the terminal, so a
/// failure only needs to be turned into the matching exit code.
#[instrument]
pub fn wrap(git_run_info: &GitRunInfo, args: Vec<String>) -> EyreExitOr<()> {
    match git_run_info.stream(&[args.into()]).wait() {
        Ok(()) => Ok(Ok(())),
        Err(Error::Command(err)) => Ok(Err(err.exit_code)),
        Err(err) => Err(err.into()),
    }
}
