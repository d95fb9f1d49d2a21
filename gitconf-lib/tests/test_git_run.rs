use std::path::PathBuf;

use gitconf::git::{Error, GitExecutor, GitRunInfo};
use gitconf::git_args;
use gitconf::testing::{make_git, SharedBuffer};
use gitconf::util::ExitCode;

#[test]
fn test_run_reports_failure_as_data() -> eyre::Result<()> {
    let git = make_git()?;
    git.init_repo()?;
    let git_run_info = git.get_run_info();

    let result = git_run_info.run(&git_args!["some-nonexistent-command"])?;
    assert_eq!(result.exit_code, ExitCode(1));
    assert!(result.stdout.is_empty());
    assert!(result
        .stderr
        .starts_with("git: 'some-nonexistent-command' is not a git command."));

    let result = git_run_info.run(&git_args!["config", "--get", "no.such-key"])?;
    assert_eq!(result.exit_code, ExitCode(1));

    Ok(())
}

#[test]
fn test_exec() -> eyre::Result<()> {
    let git = make_git()?;
    git.init_repo()?;
    git.run(&["config", "user.name", "  Spaced Out  "])?;
    let git_run_info = git.get_run_info();

    // Only the trailing newline is removed.
    let stdout = git_run_info.exec(&git_args!["config", "--get", "user.name"])?;
    assert_eq!(stdout, "  Spaced Out  ");

    let err = git_run_info
        .exec(&git_args!["config", vec!["--add", "nosection"], "value"])
        .unwrap_err();
    let err = err.as_command_error().expect("command error");
    assert_eq!(err.exit_code, ExitCode(2));
    assert!(err.stdout.is_empty());
    assert_eq!(err.stderr, "error: key does not contain a section: nosection");
    assert!(err.command.ends_with(" config --add nosection value"));

    Ok(())
}

#[test]
fn test_exec_succeeded() -> eyre::Result<()> {
    let git = make_git()?;
    git.init_repo()?;
    let git_run_info = git.get_run_info();

    assert!(git_run_info.exec_succeeded(&git_args!["rev-parse", "--git-dir"])?);
    assert!(!git_run_info.exec_succeeded(&git_args!["config", "--get", "no.such-key"])?);

    Ok(())
}

#[test]
fn test_missing_executable_is_an_invocation_error() -> eyre::Result<()> {
    let git = make_git()?;
    let git_run_info = GitRunInfo {
        path_to_git: PathBuf::from("/nonexistent/path/to/git"),
        ..git.get_run_info()
    };

    let err = git_run_info.run(&git_args!["--version"]).unwrap_err();
    assert!(matches!(err, Error::Invocation { .. }));

    // Not downgraded by predicates either.
    let err = git_run_info
        .exec_succeeded(&git_args!["--version"])
        .unwrap_err();
    assert!(matches!(err, Error::Invocation { .. }));

    let completion = git_run_info.stream_to(
        &git_args!["--version"],
        SharedBuffer::default(),
        SharedBuffer::default(),
    );
    let err = futures::executor::block_on(completion).unwrap_err();
    assert!(matches!(err, Error::Invocation { .. }));

    Ok(())
}

#[test]
fn test_stream_success() -> eyre::Result<()> {
    let git = make_git()?;
    git.init_repo()?;
    git.run(&["config", "user.name", "Alice"])?;
    let git_run_info = git.get_run_info();

    let stdout = SharedBuffer::default();
    let stderr = SharedBuffer::default();
    let completion = git_run_info.stream_to(
        &git_args!["config", "--get", "user.name"],
        stdout.clone(),
        stderr.clone(),
    );
    futures::executor::block_on(completion)?;
    assert_eq!(stdout.contents(), "Alice\n");
    assert_eq!(stderr.contents(), "");

    Ok(())
}

#[test]
fn test_stream_failure() -> eyre::Result<()> {
    let git = make_git()?;
    git.init_repo()?;
    let git_run_info = git.get_run_info();

    let stdout = SharedBuffer::default();
    let stderr = SharedBuffer::default();
    let completion = git_run_info.stream_to(
        &git_args!["config", "--add", "nosection", "it's"],
        stdout.clone(),
        stderr.clone(),
    );
    assert!(completion.command().ends_with(" config --add nosection 'it'\\''s'"));

    let err = completion.wait().unwrap_err();
    let err = err.as_command_error().expect("command error");
    assert_eq!(err.exit_code, ExitCode(2));
    assert_eq!(err.stderr, "error: key does not contain a section: nosection");
    assert!(err.stdout.is_empty());
    assert!(err.command.ends_with(" config --add nosection 'it'\\''s'"));

    // The stderr was also forwarded live.
    assert_eq!(
        stderr.contents(),
        "error: key does not contain a section: nosection\n"
    );
    assert_eq!(stdout.contents(), "");

    Ok(())
}

#[test]
fn test_concurrent_streams_are_independent() -> eyre::Result<()> {
    let git = make_git()?;
    git.init_repo()?;
    let git_run_info = git.get_run_info();

    let completions: Vec<_> = (0..4)
        .map(|i| {
            let args = if i % 2 == 0 {
                git_args!["rev-parse", "--git-dir"]
            } else {
                git_args!["config", "--get", "no.such-key"]
            };
            git_run_info.stream_to(&args, SharedBuffer::default(), SharedBuffer::default())
        })
        .collect();
    let results = futures::executor::block_on(futures::future::join_all(completions));
    let succeeded: Vec<bool> = results.iter().map(Result::is_ok).collect();
    assert_eq!(succeeded, vec![true, false, true, false]);

    Ok(())
}
