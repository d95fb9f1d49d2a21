//! Read and write configuration values, rendering the results for the
//! terminal.

use std::io::Write;

use lib::git::{
    ConfigLookup, ConfigScope, Error, GetOptions, GitConfig, GitExecutor, SetOptions,
};
use lib::util::{ExitCode, EyreExitOr};
use tracing::instrument;

/// Report a failed Git command on `stderr` and exit with Git's exit code.
/// Failing to run Git at all is fatal.
fn exit_with_git_error(stderr: &mut impl Write, err: Error) -> EyreExitOr<()> {
    match err {
        Error::Command(err) => {
            writeln!(stderr, "{err}")?;
            Ok(Err(err.exit_code))
        }
        err => Err(err.into()),
    }
}

/// Print the value(s) of `key`. Exits with code 1 if nothing was found.
#[instrument(skip(git_config, stdout))]
pub fn get<E: GitExecutor>(
    git_config: &GitConfig<E>,
    stdout: &mut impl Write,
    key: &str,
    options: GetOptions,
) -> EyreExitOr<()> {
    let lookup = git_config.get(key, options)?;
    if lookup.is_empty() {
        return Ok(Err(ExitCode(1)));
    }

    match lookup {
        ConfigLookup::Value(value) => {
            if let Some(value) = value {
                writeln!(stdout, "{value}")?;
            }
        }
        ConfigLookup::All(values) => {
            for value in values {
                writeln!(stdout, "{value}")?;
            }
        }
        ConfigLookup::Matches(matches) => {
            for (key, values) in matches {
                for value in values {
                    if value.is_empty() {
                        writeln!(stdout, "{key}")?;
                    } else {
                        writeln!(stdout, "{key} {value}")?;
                    }
                }
            }
        }
    }
    Ok(Ok(()))
}

#[instrument(skip(git_config, stderr))]
pub fn set<E: GitExecutor>(
    git_config: &GitConfig<E>,
    stderr: &mut impl Write,
    key: &str,
    values: Vec<String>,
    options: SetOptions,
) -> EyreExitOr<()> {
    match git_config.set(key, values, options) {
        Ok(_) => Ok(Ok(())),
        Err(err) => exit_with_git_error(stderr, err),
    }
}

/// Remove every value of `key`, or only `values` if any are given. In the
/// latter case the removed values are printed.
#[instrument(skip(git_config, stdout, stderr))]
pub fn unset<E: GitExecutor>(
    git_config: &GitConfig<E>,
    stdout: &mut impl Write,
    stderr: &mut impl Write,
    key: &str,
    values: Vec<String>,
    scope: ConfigScope,
) -> EyreExitOr<()> {
    if values.is_empty() {
        return match git_config.unset(key, scope) {
            Ok(()) => Ok(Ok(())),
            Err(err) => exit_with_git_error(stderr, err),
        };
    }

    match git_config.unset_matching(key, values, scope) {
        Ok(removed) => {
            for value in removed {
                writeln!(stdout, "{value}")?;
            }
            Ok(Ok(()))
        }
        Err(err) => exit_with_git_error(stderr, err),
    }
}

#[instrument(skip(git_config, stdout))]
pub fn subsections<E: GitExecutor>(
    git_config: &GitConfig<E>,
    stdout: &mut impl Write,
    section: &str,
    scope: ConfigScope,
) -> EyreExitOr<()> {
    for subsection in git_config.subsections(section, scope)? {
        writeln!(stdout, "{subsection}")?;
    }
    Ok(Ok(()))
}

#[instrument(skip(git_config))]
pub fn section_exists<E: GitExecutor>(
    git_config: &GitConfig<E>,
    section: &str,
    scope: ConfigScope,
) -> EyreExitOr<()> {
    if git_config.section_exists(section, scope)? {
        Ok(Ok(()))
    } else {
        Ok(Err(ExitCode(1)))
    }
}

#[instrument(skip(git_config, stderr))]
pub fn remove_section<E: GitExecutor>(
    git_config: &GitConfig<E>,
    stderr: &mut impl Write,
    section: &str,
    scope: ConfigScope,
) -> EyreExitOr<()> {
    match git_config.remove_section(section, scope) {
        Ok(()) => Ok(Ok(())),
        Err(err) => exit_with_git_error(stderr, err),
    }
}

#[instrument(skip(git_config, stderr))]
pub fn rename_section<E: GitExecutor>(
    git_config: &GitConfig<E>,
    stderr: &mut impl Write,
    section: &str,
    new_name: &str,
    scope: ConfigScope,
) -> EyreExitOr<()> {
    match git_config.rename_section(section, new_name, scope) {
        Ok(()) => Ok(Ok(())),
        Err(err) => exit_with_git_error(stderr, err),
    }
}
