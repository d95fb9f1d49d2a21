//! Testing utilities.
//!
//! This is inside `src` rather than `tests` since we use this code in some unit
//! tests.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;
use std::io;
use std::ops::Deref;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};

use eyre::Context;
use itertools::Itertools;
use once_cell::sync::OnceCell;
use regex::Regex;
use tempfile::TempDir;
use tracing::instrument;

use crate::core::env_vars::resolve_path_to_git;
use crate::git::{ConfigScope, GitConfig, GitExecutor, GitRunInfo, GitRunResult};
use crate::util::ExitCode;

/// Wrapper around the Git executable, for testing.
#[derive(Clone, Debug)]
pub struct Git {
    /// The path to the repository on disk. The directory itself must exist,
    /// although it might not have a `.git` folder in it. (Use `Git::init_repo`
    /// to initialize it.)
    pub repo_path: PathBuf,

    /// The directory used as `HOME`, which holds the global configuration
    /// file. Isolated from the real user's configuration.
    pub home_path: PathBuf,

    /// The path to the Git executable on disk.
    pub path_to_git: PathBuf,
}

/// Options for `Git::run_with_options`.
#[derive(Debug, Default)]
pub struct GitRunOptions {
    /// The exit code that `Git` should return.
    pub expected_exit_code: i32,

    /// Additional environment variables to start the process with.
    pub env: HashMap<String, String>,
}

impl Git {
    /// Constructor.
    pub fn new(path_to_git: PathBuf, repo_path: PathBuf, home_path: PathBuf) -> Self {
        Git {
            repo_path,
            home_path,
            path_to_git,
        }
    }

    /// Get the environment variables needed to run git in the test environment.
    pub fn get_base_env(&self) -> Vec<(OsString, OsString)> {
        let ceiling = self
            .repo_path
            .parent()
            .map(|parent| parent.as_os_str().to_owned())
            .unwrap_or_default();
        let envs = vec![
            ("GIT_CONFIG_NOSYSTEM", OsString::from("1")),
            ("GIT_CEILING_DIRECTORIES", ceiling),
            ("HOME", self.home_path.as_os_str().into()),
            ("XDG_CONFIG_HOME", self.home_path.join(".config").into()),
            ("PATH", std::env::var_os("PATH").unwrap_or_default()),
        ];

        envs.into_iter()
            .map(|(key, value)| (OsString::from(key), value))
            .collect()
    }

    /// A `GitRunInfo` which runs Git in the test repository, with the test
    /// environment.
    pub fn get_run_info(&self) -> GitRunInfo {
        GitRunInfo {
            path_to_git: self.path_to_git.clone(),
            working_directory: self.repo_path.clone(),
            env: self.get_base_env().into_iter().collect(),
        }
    }

    /// A `GitConfig` for the test repository.
    pub fn get_config(&self) -> GitConfig<GitRunInfo> {
        GitConfig::new(self.get_run_info())
    }

    #[instrument]
    fn run_with_options_inner(
        &self,
        args: &[&str],
        options: &GitRunOptions,
    ) -> eyre::Result<(String, String)> {
        let GitRunOptions {
            expected_exit_code,
            env,
        } = options;

        let env: BTreeMap<_, _> = self
            .get_base_env()
            .into_iter()
            .chain(
                env.iter()
                    .map(|(k, v)| (OsString::from(k), OsString::from(v))),
            )
            .collect();
        let result = Command::new(&self.path_to_git)
            .current_dir(&self.repo_path)
            .args(args)
            .env_clear()
            .envs(&env)
            .stdin(Stdio::null())
            .output()
            .wrap_err_with(|| {
                format!(
                    "Running git
                    Executable: {:?}
                    Args: {:?}
                    Env: <not shown>",
                    &self.path_to_git, &args
                )
            })?;

        let exit_code = result
            .status
            .code()
            .ok_or_else(|| eyre::eyre!("Git process was terminated by a signal"))?;
        if exit_code != *expected_exit_code {
            eyre::bail!(
                "Git command {:?} {:?} exited with unexpected code {} (expected {})
stdout:
{}
stderr:
{}",
                &self.path_to_git,
                &args,
                exit_code,
                expected_exit_code,
                &String::from_utf8_lossy(&result.stdout),
                &String::from_utf8_lossy(&result.stderr),
            )
        }
        let stdout = String::from_utf8(result.stdout)?;
        let stderr = String::from_utf8(result.stderr)?;
        Ok((stdout, stderr))
    }

    /// Run a Git command.
    pub fn run_with_options<S: AsRef<str> + std::fmt::Debug>(
        &self,
        args: &[S],
        options: &GitRunOptions,
    ) -> eyre::Result<(String, String)> {
        self.run_with_options_inner(
            args.iter().map(|arg| arg.as_ref()).collect_vec().as_slice(),
            options,
        )
    }

    /// Run a Git command, which must succeed.
    pub fn run<S: AsRef<str> + std::fmt::Debug>(
        &self,
        args: &[S],
    ) -> eyre::Result<(String, String)> {
        self.run_with_options(args, &Default::default())
    }

    /// Set up a Git repo in the directory.
    #[instrument]
    pub fn init_repo(&self) -> eyre::Result<()> {
        self.run(&["init", "--quiet"])?;
        Ok(())
    }
}

/// Wrapper around a `Git` instance which cleans up the repository once it's
/// been dropped.
pub struct GitWrapper {
    temp_dir: TempDir,
    git: Git,
}

impl Deref for GitWrapper {
    type Target = Git;

    fn deref(&self) -> &Self::Target {
        &self.git
    }
}

impl GitWrapper {
    /// The temporary directory holding the repository and `HOME`.
    pub fn temp_dir(&self) -> &TempDir {
        &self.temp_dir
    }
}

static COLOR_EYRE_INSTALL: OnceCell<()> = OnceCell::new();

/// Create a temporary directory for testing and a `Git` instance to use with it.
pub fn make_git() -> eyre::Result<GitWrapper> {
    COLOR_EYRE_INSTALL.get_or_try_init(color_eyre::install)?;

    let temp_dir = tempfile::tempdir()?;
    let repo_path = temp_dir.path().join("repo");
    let home_path = temp_dir.path().join("home");
    std::fs::create_dir_all(&repo_path)?;
    std::fs::create_dir_all(&home_path)?;
    let git = Git::new(resolve_path_to_git(), repo_path, home_path);
    Ok(GitWrapper { temp_dir, git })
}

/// A cloneable, thread-safe byte sink. Useful for capturing output which is
/// written from another thread, such as by `GitRunInfo::stream_to`.
#[derive(Clone, Debug, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    /// The bytes written so far, decoded as UTF-8.
    pub fn contents(&self) -> String {
        match self.0.lock() {
            Ok(buf) => String::from_utf8_lossy(&buf).into_owned(),
            Err(poisoned) => String::from_utf8_lossy(&poisoned.into_inner()).into_owned(),
        }
    }
}

impl io::Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self
            .0
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "buffer lock poisoned"))?;
        inner.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Clone, Debug)]
struct FakeEntry {
    scope: ConfigScope,
    key: String,
    value: String,
}

/// An in-memory stand-in for the `git config` command, for testing code
/// written against `GitExecutor` without spawning processes.
///
/// It understands the subset of `git config` used by `GitConfig`: the
/// `--local`/`--global` scope flags, `--get`, `--get-all`, `--get-regexp`,
/// `--add`, `--unset-all` (with an optional value pattern),
/// `--remove-section` and `--rename-section`, with Git's exit codes. Reads
/// without a scope see global entries before local ones; writes without a
/// scope go to the local file.
#[derive(Debug, Default)]
pub struct FakeGitConfig {
    entries: RefCell<Vec<FakeEntry>>,
    invocations: RefCell<Vec<Vec<String>>>,
}

fn fake_result(exit_code: isize, stdout: &str, stderr: &str) -> GitRunResult {
    GitRunResult::from_output(ExitCode(exit_code), stdout.as_bytes(), stderr.as_bytes())
}

/// Lowercase the section and variable names of `key`, leaving any
/// subsection alone. Returns `None` for keys Git would reject.
fn canonicalize_key(key: &str) -> Option<String> {
    let (section, name) = key.rsplit_once('.')?;
    if section.is_empty() || name.is_empty() {
        return None;
    }
    Some(format!("{}.{}", canonicalize_section(section), name.to_lowercase()))
}

fn canonicalize_section(section: &str) -> String {
    match section.split_once('.') {
        Some((section, subsection)) => format!("{}.{}", section.to_lowercase(), subsection),
        None => section.to_lowercase(),
    }
}

/// Lowercase a key pattern the way `git config --get-regexp` does: every
/// character before the first `.` and after the last `.`. Patterns with no
/// `.` are lowercased entirely.
fn canonicalize_pattern(pattern: &str) -> String {
    match (pattern.find('.'), pattern.rfind('.')) {
        (Some(first), Some(last)) => format!(
            "{}{}{}",
            pattern[..first].to_lowercase(),
            &pattern[first..=last],
            pattern[last + 1..].to_lowercase()
        ),
        _ => pattern.to_lowercase(),
    }
}

fn section_of(key: &str) -> &str {
    key.rsplit_once('.').map(|(section, _)| section).unwrap_or(key)
}

impl FakeGitConfig {
    /// Every argument list this executor has been invoked with, in order.
    pub fn invocations(&self) -> Vec<Vec<String>> {
        self.invocations.borrow().clone()
    }

    /// The entries visible to a read in `scope`, in precedence order.
    fn visible(&self, scope: ConfigScope) -> Vec<FakeEntry> {
        let entries = self.entries.borrow();
        let in_scope = |wanted: ConfigScope| {
            entries
                .iter()
                .filter(move |entry| entry.scope == wanted)
                .cloned()
        };
        match scope {
            ConfigScope::Default => in_scope(ConfigScope::Global)
                .chain(in_scope(ConfigScope::Local))
                .collect(),
            scope => in_scope(scope).collect(),
        }
    }

    fn values_of(&self, key: &str, scope: ConfigScope) -> Option<Vec<String>> {
        let key = canonicalize_key(key)?;
        Some(
            self.visible(scope)
                .into_iter()
                .filter(|entry| entry.key == key)
                .map(|entry| entry.value)
                .collect(),
        )
    }

    /// Git reports a malformed key with exit code 1 when reading, and 2
    /// when writing.
    fn invalid_key(key: &str, exit_code: isize) -> GitRunResult {
        fake_result(
            exit_code,
            "",
            &format!("error: key does not contain a section: {key}\n"),
        )
    }

    fn dispatch(&self, scope: ConfigScope, action: &str, operands: &[String]) -> GitRunResult {
        let write_scope = match scope {
            ConfigScope::Default => ConfigScope::Local,
            scope => scope,
        };
        match (action, operands) {
            ("--get", [key]) => match self.values_of(key, scope) {
                None => Self::invalid_key(key, 1),
                Some(values) => match values.last() {
                    Some(value) => fake_result(0, &format!("{value}\n"), ""),
                    None => fake_result(1, "", ""),
                },
            },

            ("--get-all", [key]) => match self.values_of(key, scope) {
                None => Self::invalid_key(key, 1),
                Some(values) if values.is_empty() => fake_result(1, "", ""),
                Some(values) => {
                    let stdout = values.iter().map(|value| format!("{value}\n")).join("");
                    fake_result(0, &stdout, "")
                }
            },

            ("--get-regexp", [pattern]) => {
                let pattern = match Regex::new(&canonicalize_pattern(pattern)) {
                    Ok(pattern) => pattern,
                    Err(_) => {
                        return fake_result(6, "", &format!("error: invalid key pattern: {pattern}\n"))
                    }
                };
                let stdout = self
                    .visible(scope)
                    .into_iter()
                    .filter(|entry| pattern.is_match(&entry.key))
                    .map(|entry| format!("{} {}\n", entry.key, entry.value))
                    .join("");
                if stdout.is_empty() {
                    fake_result(1, "", "")
                } else {
                    fake_result(0, &stdout, "")
                }
            }

            ("--add", [key, value]) => match canonicalize_key(key) {
                None => Self::invalid_key(key, 2),
                Some(key) => {
                    self.entries.borrow_mut().push(FakeEntry {
                        scope: write_scope,
                        key,
                        value: value.clone(),
                    });
                    fake_result(0, "", "")
                }
            },

            ("--unset-all", [key, value_pattern @ ..]) if value_pattern.len() <= 1 => {
                let key = match canonicalize_key(key) {
                    Some(key) => key,
                    None => return Self::invalid_key(key, 2),
                };
                let value_pattern = match value_pattern.first().map(|pattern| Regex::new(pattern))
                {
                    None => None,
                    Some(Ok(pattern)) => Some(pattern),
                    Some(Err(_)) => return fake_result(6, "", "error: invalid pattern\n"),
                };
                let mut entries = self.entries.borrow_mut();
                let num_before = entries.len();
                entries.retain(|entry| {
                    let matches = entry.scope == write_scope
                        && entry.key == key
                        && value_pattern
                            .as_ref()
                            .map_or(true, |pattern| pattern.is_match(&entry.value));
                    !matches
                });
                if entries.len() == num_before {
                    fake_result(5, "", "")
                } else {
                    fake_result(0, "", "")
                }
            }

            ("--remove-section", [section]) => {
                let section = canonicalize_section(section);
                let mut entries = self.entries.borrow_mut();
                let num_before = entries.len();
                entries.retain(|entry| {
                    !(entry.scope == write_scope && section_of(&entry.key) == section)
                });
                if entries.len() == num_before {
                    fake_result(128, "", &format!("fatal: no such section: {section}\n"))
                } else {
                    fake_result(0, "", "")
                }
            }

            ("--rename-section", [section, new_name]) => {
                let section = canonicalize_section(section);
                let new_name = canonicalize_section(new_name);
                let mut found = false;
                for entry in self.entries.borrow_mut().iter_mut() {
                    if entry.scope == write_scope && section_of(&entry.key) == section {
                        let name = entry.key[section.len()..].to_string();
                        entry.key = format!("{new_name}{name}");
                        found = true;
                    }
                }
                if found {
                    fake_result(0, "", "")
                } else {
                    fake_result(128, "", &format!("fatal: no such section: {section}\n"))
                }
            }

            _ => fake_result(129, "", "usage: git config [<options>]\n"),
        }
    }
}

impl GitExecutor for FakeGitConfig {
    fn run_args(&self, args: Vec<String>) -> crate::git::Result<GitRunResult> {
        self.invocations.borrow_mut().push(args.clone());

        let rest = match args.split_first() {
            Some((subcommand, rest)) if subcommand == "config" => rest,
            _ => {
                let command = args.first().cloned().unwrap_or_default();
                return Ok(fake_result(
                    1,
                    "",
                    &format!("git: '{command}' is not a git command\n"),
                ));
            }
        };
        let (scope, rest) = match rest.split_first() {
            Some((flag, rest)) if flag == "--local" => (ConfigScope::Local, rest),
            Some((flag, rest)) if flag == "--global" => (ConfigScope::Global, rest),
            _ => (ConfigScope::Default, rest),
        };
        let result = match rest.split_first() {
            Some((action, operands)) => self.dispatch(scope, action, operands),
            None => fake_result(129, "", "usage: git config [<options>]\n"),
        };
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_key() {
        assert_eq!(canonicalize_key("User.Name").as_deref(), Some("user.name"));
        assert_eq!(
            canonicalize_key("Remote.Origin.URL").as_deref(),
            Some("remote.Origin.url")
        );
        assert_eq!(canonicalize_key("nosection"), None);
        assert_eq!(canonicalize_key("trailing."), None);
    }

    #[test]
    fn test_canonicalize_pattern() {
        assert_eq!(canonicalize_pattern("^Remote\\.Origin\\."), "^remote\\.Origin\\.");
        assert_eq!(canonicalize_pattern("^Core\\.Bare$"), "^core\\.bare$");
        assert_eq!(canonicalize_pattern("USER"), "user");
    }

    #[test]
    fn test_fake_exit_codes() -> crate::git::Result<()> {
        let fake = FakeGitConfig::default();
        let run = |args: &[&str]| {
            fake.run_args(args.iter().map(|arg| arg.to_string()).collect())
                .map(|result| result.exit_code)
        };

        assert_eq!(run(&["config", "--get", "a.b"])?, ExitCode(1));
        assert_eq!(run(&["config", "--unset-all", "a.b"])?, ExitCode(5));
        assert_eq!(run(&["config", "--add", "a.b", "c"])?, ExitCode(0));
        assert_eq!(run(&["config", "--global", "--get", "a.b"])?, ExitCode(1));
        assert_eq!(run(&["config", "--remove-section", "x"])?, ExitCode(128));
        assert_eq!(run(&["status"])?, ExitCode(1));
        assert_eq!(fake.invocations().len(), 6);
        Ok(())
    }
}
