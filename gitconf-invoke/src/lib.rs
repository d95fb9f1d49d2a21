//! This crate sets up the process for a `gitconf` executable: it installs
//! error reporting and tracing, applies the global arguments, and locates
//! the Git executable before handing control to the subcommand.

#![warn(missing_docs)]
#![warn(
    clippy::all,
    clippy::as_conversions,
    clippy::clone_on_ref_ptr,
    clippy::dbg_macro
)]
#![allow(clippy::too_many_arguments, clippy::blocks_in_conditions)]

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::SystemTime;

use clap::{CommandFactory, FromArgMatches, Parser};
use eyre::Context;
use gitconf_opts::GlobalArgs;
use lib::core::env_vars::resolve_path_to_git;
use lib::git::GitRunInfo;
use lib::util::{ExitCode, EyreExitOr};
use tracing::instrument;
use tracing::level_filters::LevelFilter;
use tracing_chrome::{ChromeLayerBuilder, FlushGuard};
use tracing_error::ErrorLayer;
use tracing_subscriber::fmt as tracing_fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Shared context for all commands.
#[derive(Clone, Debug)]
pub struct CommandContext {
    /// Information about the Git executable currently being used.
    pub git_run_info: GitRunInfo,
}

/// The file to write a Chrome trace to, as requested by `RUST_PROFILE`.
/// `1` or `true` selects the default `gitconf-trace` prefix; any other
/// non-empty value is used as the prefix. The file name ends with the
/// number of seconds since the epoch, so successive runs don't collide.
fn profile_path(rust_profile: Option<&str>, now: SystemTime) -> eyre::Result<Option<PathBuf>> {
    let prefix = match rust_profile {
        None | Some("") => return Ok(None),
        Some("1") | Some("true") => "gitconf-trace",
        Some(prefix) => prefix,
    };
    let timestamp = now.duration_since(SystemTime::UNIX_EPOCH)?.as_secs();
    Ok(Some(PathBuf::from(format!("{prefix}-{timestamp}.json"))))
}

#[must_use = "The returned guard flushes the profile when dropped, so it must live until tracing has finished."]
#[instrument]
fn install_tracing() -> eyre::Result<Option<FlushGuard>> {
    // Third-party crates are silenced unless `RUST_LOG` says otherwise.
    let directives = std::env::var(EnvFilter::DEFAULT_ENV)
        .unwrap_or_else(|_| "gitconf=warn".to_string());
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .parse(directives)?;
    let fmt_layer = tracing_fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(env_filter);

    let rust_profile = std::env::var("RUST_PROFILE").ok();
    let (profile_layer, flush_guard) =
        match profile_path(rust_profile.as_deref(), SystemTime::now())? {
            Some(path) => {
                let include_args = std::env::var_os("RUST_PROFILE_INCLUDE_ARGS")
                    .map_or(false, |value| !value.is_empty());
                let (layer, flush_guard) = ChromeLayerBuilder::new()
                    .file(path)
                    .include_args(include_args)
                    .build();
                (Some(layer), Some(flush_guard))
            }
            None => (None, None),
        };

    tracing_subscriber::registry()
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .with(profile_layer)
        .try_init()?;

    Ok(flush_guard)
}

/// Build the `GitRunInfo` for this process: the resolved Git executable, run
/// in the current directory with this process's environment.
#[instrument]
pub fn make_git_run_info() -> eyre::Result<GitRunInfo> {
    let git_run_info = GitRunInfo {
        path_to_git: resolve_path_to_git(),
        working_directory: std::env::current_dir()
            .wrap_err("Could not determine the current directory")?,
        env: std::env::vars_os().collect::<HashMap<OsString, OsString>>(),
    };
    Ok(git_run_info)
}

/// Wrapper function for `main` to ensure that `Drop` is called for local
/// variables, since `std::process::exit` will skip them. You probably want to
/// call `invoke_subcommand_main` instead.
#[instrument(skip(f))]
pub fn do_main_and_drop_locals<T: Parser>(
    f: impl Fn(CommandContext, T) -> EyreExitOr<()>,
    args: Vec<OsString>,
) -> eyre::Result<i32> {
    let command = GlobalArgs::command();
    let command_args = T::parse_from(&args);
    let matches = command.ignore_errors(true).get_matches_from(&args);
    let GlobalArgs { working_directory } = GlobalArgs::from_arg_matches(&matches)
        .map_err(|err| eyre::eyre!("Could not parse global arguments: {err}"))?;

    if let Some(working_directory) = working_directory {
        std::env::set_current_dir(&working_directory).wrap_err_with(|| {
            format!(
                "Could not set working directory to: {:?}",
                &working_directory
            )
        })?;
    }

    let _tracing_guard = install_tracing()?;
    let git_run_info = make_git_run_info()?;
    let ctx = CommandContext { git_run_info };
    let exit_code = match f(ctx, command_args)? {
        Ok(()) => 0,
        Err(ExitCode(exit_code)) => {
            let exit_code: i32 = exit_code.try_into()?;
            exit_code
        }
    };
    Ok(exit_code)
}

/// Invoke the provided subcommand main function. This should be used in the
/// `main.rs` file of an executable. For example:
///
/// ```ignore
/// fn main() {
///     gitconf_invoke::invoke_subcommand_main(gitconf::commands::command_main)
/// }
/// ```
#[instrument(skip(f))]
pub fn invoke_subcommand_main<T: Parser>(f: impl Fn(CommandContext, T) -> EyreExitOr<()>) {
    // Install panic handler.
    color_eyre::install().expect("Could not install panic handler");
    let args = std::env::args_os().collect();
    let exit_code = do_main_and_drop_locals(f, args).expect("A fatal error occurred");
    std::process::exit(exit_code);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_path() -> eyre::Result<()> {
        let now = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1234);
        assert_eq!(profile_path(None, now)?, None);
        assert_eq!(profile_path(Some(""), now)?, None);
        assert_eq!(
            profile_path(Some("1"), now)?,
            Some(PathBuf::from("gitconf-trace-1234.json"))
        );
        assert_eq!(
            profile_path(Some("true"), now)?,
            Some(PathBuf::from("gitconf-trace-1234.json"))
        );
        assert_eq!(
            profile_path(Some("/tmp/get"), now)?,
            Some(PathBuf::from("/tmp/get-1234.json"))
        );
        Ok(())
    }

    #[test]
    fn test_make_git_run_info_uses_current_directory() -> eyre::Result<()> {
        let git_run_info = make_git_run_info()?;
        assert_eq!(git_run_info.working_directory, std::env::current_dir()?);
        assert!(!git_run_info.path_to_git.as_os_str().is_empty());
        Ok(())
    }
}
