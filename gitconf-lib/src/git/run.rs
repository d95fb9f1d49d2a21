use std::collections::HashMap;
use std::ffi::OsString;
use std::future::Future;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::pin::Pin;
use std::process::{Command, Stdio};
use std::task::{Context, Poll};
use std::thread::{self, JoinHandle};

use futures::channel::oneshot;
use itertools::Itertools;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::util::ExitCode;

/// A single argument, or an arbitrarily nested group of arguments, to pass to
/// Git. Groups are flattened depth-first before invocation, so callers can
/// splice optional flags and lists of values into an argument list without
/// building it up by hand.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GitArg {
    /// A single argument.
    One(String),

    /// A group of arguments, possibly empty.
    Group(Vec<GitArg>),
}

impl From<&str> for GitArg {
    fn from(arg: &str) -> Self {
        GitArg::One(arg.to_string())
    }
}

impl From<String> for GitArg {
    fn from(arg: String) -> Self {
        GitArg::One(arg)
    }
}

impl From<&String> for GitArg {
    fn from(arg: &String) -> Self {
        GitArg::One(arg.clone())
    }
}

impl<T: Into<GitArg>> From<Vec<T>> for GitArg {
    fn from(args: Vec<T>) -> Self {
        GitArg::Group(args.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<GitArg> + Clone> From<&[T]> for GitArg {
    fn from(args: &[T]) -> Self {
        GitArg::Group(args.iter().cloned().map(Into::into).collect())
    }
}

impl<T: Into<GitArg>, const N: usize> From<[T; N]> for GitArg {
    fn from(args: [T; N]) -> Self {
        GitArg::Group(args.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<GitArg>> From<Option<T>> for GitArg {
    fn from(arg: Option<T>) -> Self {
        match arg {
            Some(arg) => arg.into(),
            None => GitArg::Group(Vec::new()),
        }
    }
}

/// Build a `Vec<GitArg>` out of heterogeneous parts.
///
/// ```
/// use gitconf::git_args;
/// use gitconf::git::flatten_args;
///
/// let scope_flag: Option<&str> = None;
/// let args = git_args!["config", scope_flag, vec!["--add", "user.name"], "Alice"];
/// assert_eq!(flatten_args(&args), vec!["config", "--add", "user.name", "Alice"]);
/// ```
#[macro_export]
macro_rules! git_args {
    ($($arg:expr),* $(,)?) => {
        vec![$($crate::git::GitArg::from($arg)),*]
    };
}

/// Flatten the provided (possibly nested) arguments into the flat list which
/// is actually passed to the executable, preserving their relative order.
pub fn flatten_args(args: &[GitArg]) -> Vec<String> {
    fn helper(acc: &mut Vec<String>, arg: &GitArg) {
        match arg {
            GitArg::One(arg) => acc.push(arg.clone()),
            GitArg::Group(args) => {
                for arg in args {
                    helper(acc, arg);
                }
            }
        }
    }

    let mut acc = Vec::new();
    for arg in args {
        helper(&mut acc, arg);
    }
    acc
}

/// Render a command line for display, quoting each argument individually.
pub fn command_line(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .map(|arg| shell_words::quote(arg))
        .join(" ")
}

/// Remove a single trailing line terminator from captured output.
fn strip_trailing_newline(mut output: String) -> String {
    if output.ends_with('\n') {
        output.pop();
        if output.ends_with('\r') {
            output.pop();
        }
    }
    output
}

/// Git ran, but exited unsuccessfully where success was required.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("command exited with code {exit_code}: {command}\n{stderr}")]
pub struct CommandError {
    /// The exit code of the process.
    pub exit_code: ExitCode,

    /// The invoked command line, for display purposes only.
    pub command: String,

    /// The captured stdout of the process.
    pub stdout: String,

    /// The captured stderr of the process.
    pub stderr: String,
}

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum Error {
    #[error("could not run {command}: {source}")]
    Invocation {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("lost track of subprocess before it completed: {command}")]
    Abandoned { command: String },
}

impl Error {
    /// The `CommandError` carried by this error, if Git ran to completion.
    pub fn as_command_error(&self) -> Option<&CommandError> {
        match self {
            Error::Command(err) => Some(err),
            Error::Invocation { .. } | Error::Abandoned { .. } => None,
        }
    }
}

#[allow(missing_docs)]
pub type Result<T> = std::result::Result<T, Error>;

/// The result of invoking Git. Neither stream is interpreted; a non-zero
/// exit code is reported as data.
#[must_use]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GitRunResult {
    /// The exit code of the process.
    pub exit_code: ExitCode,

    /// The stdout contents written by the invocation, with its trailing
    /// newline removed.
    pub stdout: String,

    /// The stderr contents written by the invocation, with its trailing
    /// newline removed.
    pub stderr: String,
}

impl GitRunResult {
    /// Construct a result from raw captured output.
    pub fn from_output(exit_code: ExitCode, stdout: &[u8], stderr: &[u8]) -> Self {
        Self {
            exit_code,
            stdout: strip_trailing_newline(String::from_utf8_lossy(stdout).into_owned()),
            stderr: strip_trailing_newline(String::from_utf8_lossy(stderr).into_owned()),
        }
    }

    /// Convert a failed result into a `CommandError` for the given command.
    pub fn into_command_error(self, command: String) -> CommandError {
        let GitRunResult {
            exit_code,
            stdout,
            stderr,
        } = self;
        CommandError {
            exit_code,
            command,
            stdout,
            stderr,
        }
    }
}

/// The capability to run Git synchronously. Everything which talks to Git
/// goes through this trait, so that tests can substitute an in-memory
/// implementation for the real executable.
pub trait GitExecutor {
    /// Run Git with the given flat argument list and wait for it to exit.
    ///
    /// Only fails if the executable could not be run at all; a non-zero exit
    /// code is returned as part of the `GitRunResult`.
    fn run_args(&self, args: Vec<String>) -> Result<GitRunResult>;

    /// A human-readable rendering of the command line for the given
    /// arguments, used in error messages.
    fn describe(&self, args: &[String]) -> String {
        command_line("git", args)
    }

    /// Flatten `args`, run Git and return its result verbatim.
    fn run(&self, args: &[GitArg]) -> Result<GitRunResult> {
        self.run_args(flatten_args(args))
    }

    /// Run Git, requiring it to succeed. Returns its stdout, without the
    /// trailing newline.
    fn exec(&self, args: &[GitArg]) -> Result<String> {
        let args = flatten_args(args);
        let command = self.describe(&args);
        let result = self.run_args(args)?;
        if result.exit_code.is_success() {
            Ok(result.stdout)
        } else {
            Err(result.into_command_error(command).into())
        }
    }

    /// Run Git, and report only whether it exited successfully. Used for
    /// predicates, where a non-zero exit code is an expected outcome.
    fn exec_succeeded(&self, args: &[GitArg]) -> Result<bool> {
        let result = self.run(args)?;
        Ok(result.exit_code.is_success())
    }
}

impl<E: GitExecutor + ?Sized> GitExecutor for &E {
    fn run_args(&self, args: Vec<String>) -> Result<GitRunResult> {
        (**self).run_args(args)
    }

    fn describe(&self, args: &[String]) -> String {
        (**self).describe(args)
    }
}

/// Path to the `git` executable on disk to be executed.
#[derive(Clone)]
pub struct GitRunInfo {
    /// The path to the Git executable on disk.
    pub path_to_git: PathBuf,

    /// The working directory that the Git executable should be run in.
    pub working_directory: PathBuf,

    /// The environment variables that should be passed to the Git process.
    pub env: HashMap<OsString, OsString>,
}

impl std::fmt::Debug for GitRunInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<GitRunInfo path_to_git={:?} working_directory={:?} env=not shown>",
            self.path_to_git, self.working_directory
        )
    }
}

impl GitExecutor for GitRunInfo {
    #[instrument]
    fn run_args(&self, args: Vec<String>) -> Result<GitRunResult> {
        let command_line = self.describe(&args);
        debug!(%command_line, "Running Git");

        let output = self
            .command(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| Error::Invocation {
                command: command_line.clone(),
                source,
            })?;
        let exit_code = exit_code_from(output.status);
        let result = GitRunResult::from_output(exit_code, &output.stdout, &output.stderr);
        if !exit_code.is_success() {
            debug!(%command_line, ?result, "Git exited unsuccessfully");
        }
        Ok(result)
    }

    fn describe(&self, args: &[String]) -> String {
        command_line(&self.path_to_git.to_string_lossy(), args)
    }
}

fn exit_code_from(status: std::process::ExitStatus) -> ExitCode {
    // The `i32` to `isize` conversion can only fail on 16-bit platforms.
    ExitCode::try_from(status).unwrap_or(ExitCode(1))
}

impl GitRunInfo {
    fn command(&self, args: &[String]) -> Command {
        let GitRunInfo {
            path_to_git,
            working_directory,
            env,
        } = self;

        let mut command = Command::new(path_to_git);
        command.current_dir(working_directory);
        command.args(args);
        command.env_clear();
        command.envs(env.iter());
        command
    }

    /// Copy everything from `stream` to `output` as it arrives. If `capture`
    /// is set, the copied bytes are also returned when the stream closes.
    fn spawn_forwarding_thread<
        InputStream: Read + Send + 'static,
        OutputStream: Write + Send + 'static,
    >(
        stream: Option<InputStream>,
        mut output: OutputStream,
        capture: bool,
    ) -> JoinHandle<io::Result<Vec<u8>>> {
        thread::spawn(move || {
            let mut captured = Vec::new();
            let mut stream = match stream {
                Some(stream) => stream,
                None => return Ok(captured),
            };
            let mut buf = [0u8; 8192];
            loop {
                let num_read = match stream.read(&mut buf) {
                    Ok(0) => break,
                    Ok(num_read) => num_read,
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                    Err(err) => return Err(err),
                };
                let chunk = &buf[..num_read];
                output.write_all(chunk)?;
                output.flush()?;
                if capture {
                    captured.extend_from_slice(chunk);
                }
            }
            Ok(captured)
        })
    }

    /// Run Git in a subprocess without blocking, forwarding its output to
    /// this process's stdout and stderr as it is produced.
    ///
    /// This is suitable for long-running or interactive commands whose output
    /// the user should see immediately. See [`GitRunInfo::stream_to`].
    pub fn stream(&self, args: &[GitArg]) -> StreamCompletion {
        self.stream_to(args, io::stdout(), io::stderr())
    }

    /// Run Git in a subprocess without blocking, forwarding its stdout and
    /// stderr to the provided writers as it is produced.
    ///
    /// The returned completion resolves once the process has exited and its
    /// output has been fully forwarded: to `Ok(())` if it exited with code 0,
    /// and otherwise to a `CommandError` holding the stderr it wrote (stdout
    /// is not retained). There is no cancellation.
    #[instrument(skip(stdout, stderr))]
    pub fn stream_to<OutputStream, ErrorStream>(
        &self,
        args: &[GitArg],
        stdout: OutputStream,
        stderr: ErrorStream,
    ) -> StreamCompletion
    where
        OutputStream: Write + Send + 'static,
        ErrorStream: Write + Send + 'static,
    {
        let args = flatten_args(args);
        let command_line = self.describe(&args);
        debug!(%command_line, "Streaming Git");
        let (sender, receiver) = oneshot::channel();

        let spawn_result = self
            .command(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();
        match spawn_result {
            Err(source) => {
                // The receiver is held below, so sending cannot fail.
                let _ = sender.send(Err(Error::Invocation {
                    command: command_line.clone(),
                    source,
                }));
            }

            Ok(mut child) => {
                let stdout_thread =
                    Self::spawn_forwarding_thread(child.stdout.take(), stdout, false);
                let stderr_thread =
                    Self::spawn_forwarding_thread(child.stderr.take(), stderr, true);
                let command = command_line.clone();
                thread::spawn(move || {
                    let exit_status = child.wait();
                    let _ = join_forwarding_thread(stdout_thread, &command);
                    let captured_stderr = join_forwarding_thread(stderr_thread, &command);
                    let result = match exit_status {
                        Err(source) => Err(Error::Invocation { command, source }),
                        Ok(exit_status) => {
                            let exit_code = exit_code_from(exit_status);
                            if exit_code.is_success() {
                                Ok(())
                            } else {
                                let result =
                                    GitRunResult::from_output(exit_code, &[], &captured_stderr);
                                Err(result.into_command_error(command).into())
                            }
                        }
                    };
                    // The caller may have dropped the completion; nobody to tell.
                    let _ = sender.send(result);
                });
            }
        }

        StreamCompletion {
            command: command_line,
            receiver,
        }
    }
}

fn join_forwarding_thread(handle: JoinHandle<io::Result<Vec<u8>>>, command: &str) -> Vec<u8> {
    match handle.join() {
        Ok(Ok(captured)) => captured,
        Ok(Err(err)) => {
            warn!(?err, %command, "Could not forward subprocess output");
            Vec::new()
        }
        Err(_) => {
            warn!(%command, "Output forwarding thread panicked");
            Vec::new()
        }
    }
}

/// The pending completion of a subprocess started by [`GitRunInfo::stream`].
#[must_use = "The completion of a streamed command must be awaited to observe its exit status"]
pub struct StreamCompletion {
    command: String,
    receiver: oneshot::Receiver<Result<()>>,
}

impl std::fmt::Debug for StreamCompletion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<StreamCompletion command={:?}>", self.command)
    }
}

impl StreamCompletion {
    /// The command line of the streamed subprocess.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Block the current thread until the subprocess has exited.
    pub fn wait(self) -> Result<()> {
        futures::executor::block_on(self)
    }
}

impl Future for StreamCompletion {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(Error::Abandoned {
                command: self.command.clone(),
            })),
        }
    }
}
