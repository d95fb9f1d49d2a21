use gitconf::git::{ConfigLookup, ConfigScope, GetOptions, SetOptions};
use gitconf::testing::make_git;

const DEFAULT: ConfigScope = ConfigScope::Default;

#[test]
fn test_set_then_get_replaces() -> eyre::Result<()> {
    let git = make_git()?;
    git.init_repo()?;
    let config = git.get_config();

    config.set("user.name", "Alice", SetOptions::default())?;
    assert_eq!(config.get_value("user.name", DEFAULT)?.as_deref(), Some("Alice"));

    config.set("user.name", "Bob", SetOptions::default())?;
    assert_eq!(config.get_value("user.name", DEFAULT)?.as_deref(), Some("Bob"));
    assert_eq!(config.get_all("user.name", DEFAULT)?, vec!["Bob"]);

    Ok(())
}

#[test]
fn test_set_list_replaces_all_values_in_order() -> eyre::Result<()> {
    let git = make_git()?;
    git.init_repo()?;
    git.run(&["config", "--add", "remote.origin.fetch", "old1"])?;
    git.run(&["config", "--add", "remote.origin.fetch", "old2"])?;
    let config = git.get_config();

    let values = vec!["z", "a", "m", "a"];
    let written = config.set("remote.origin.fetch", values.clone(), SetOptions::default())?;
    assert_eq!(written, values);
    assert_eq!(config.get_all("remote.origin.fetch", DEFAULT)?, values);

    let (stdout, _stderr) = git.run(&["config", "--get-all", "remote.origin.fetch"])?;
    insta::assert_snapshot!(stdout, @r###"
    z
    a
    m
    a
    "###);

    Ok(())
}

#[test]
fn test_set_add_unique() -> eyre::Result<()> {
    let git = make_git()?;
    git.init_repo()?;
    let config = git.get_config();
    let unique = SetOptions {
        add: true,
        unique: true,
        ..Default::default()
    };

    config.set("branch.main.merge", vec!["dup", "dup"], SetOptions::default())?;
    config.set("branch.main.merge", vec!["x", "dup", "y"], unique)?;
    config.set("branch.main.merge", vec!["x", "dup", "y"], unique)?;

    // Pre-existing duplicates are left alone.
    assert_eq!(
        config.get_all("branch.main.merge", DEFAULT)?,
        vec!["dup", "dup", "x", "y"]
    );

    Ok(())
}

#[test]
fn test_get_misses() -> eyre::Result<()> {
    let git = make_git()?;
    git.init_repo()?;
    let config = git.get_config();

    assert_eq!(config.get_value("never.written", DEFAULT)?, None);
    assert!(config.get_all("never.written", DEFAULT)?.is_empty());
    assert!(config.get_regexp("^never\\.", DEFAULT)?.is_empty());
    assert_eq!(config.get_value("malformed", DEFAULT)?, None);
    assert_eq!(
        config.get(
            "[invalid regex",
            GetOptions {
                regex: true,
                ..Default::default()
            }
        )?,
        ConfigLookup::Matches(Default::default())
    );

    Ok(())
}

#[test]
fn test_get_regexp() -> eyre::Result<()> {
    let git = make_git()?;
    git.init_repo()?;
    let config = git.get_config();
    config.set("remote.origin.url", "https://example.com/a b.git", SetOptions::default())?;
    config.set("remote.origin.fetch", vec!["f1", "f2"], SetOptions::default())?;
    config.set("remote.upstream.url", "u2", SetOptions::default())?;

    let matches = config.get_regexp("^remote\\.", DEFAULT)?;
    insta::assert_debug_snapshot!(matches, @r###"
    {
        "remote.origin.url": [
            "https://example.com/a b.git",
        ],
        "remote.origin.fetch": [
            "f1",
            "f2",
        ],
        "remote.upstream.url": [
            "u2",
        ],
    }
    "###);

    Ok(())
}

#[test]
fn test_unset_and_unset_matching() -> eyre::Result<()> {
    let git = make_git()?;
    git.init_repo()?;
    let config = git.get_config();

    assert!(config.unset("core.nothing", DEFAULT).is_err());

    config.set(
        "remote.origin.fetch",
        vec![
            "+refs/heads/*:refs/remotes/origin/*",
            "+refs/heads/main:refs/remotes/origin/main",
            "+refs/heads/*:refs/remotes/origin/*x",
        ],
        SetOptions::default(),
    )?;
    let removed = config.unset_matching(
        "remote.origin.fetch",
        vec!["+refs/heads/*:refs/remotes/origin/*", "not-there"],
        DEFAULT,
    )?;
    assert_eq!(removed, vec!["+refs/heads/*:refs/remotes/origin/*"]);
    assert_eq!(
        config.get_all("remote.origin.fetch", DEFAULT)?,
        vec![
            "+refs/heads/main:refs/remotes/origin/main",
            "+refs/heads/*:refs/remotes/origin/*x",
        ]
    );

    config.unset("remote.origin.fetch", DEFAULT)?;
    assert!(config.get_all("remote.origin.fetch", DEFAULT)?.is_empty());

    Ok(())
}

#[test]
fn test_sections() -> eyre::Result<()> {
    let git = make_git()?;
    git.init_repo()?;
    let config = git.get_config();

    assert!(!config.section_exists("remote.origin", DEFAULT)?);
    let err = config.remove_section("remote.origin", DEFAULT).unwrap_err();
    assert!(err.as_command_error().is_some());

    config.set("remote.origin.url", "u1", SetOptions::default())?;
    config.set("remote.origin.fetch", "f1", SetOptions::default())?;
    config.set("remote.upstream.url", "u2", SetOptions::default())?;
    config.set("remote.pushDefault", "origin", SetOptions::default())?;
    assert_eq!(config.subsections("remote", DEFAULT)?, vec!["origin", "upstream"]);
    assert!(config.section_exists("remote.origin", DEFAULT)?);

    config.rename_section("remote.upstream", "remote.fork", DEFAULT)?;
    assert_eq!(config.subsections("remote", DEFAULT)?, vec!["origin", "fork"]);
    assert!(config
        .rename_section("remote.nonexistent", "remote.other", DEFAULT)
        .is_err());

    config.remove_section("remote.origin", DEFAULT)?;
    assert!(!config.section_exists("remote.origin", DEFAULT)?);
    assert_eq!(config.subsections("remote", DEFAULT)?, vec!["fork"]);

    Ok(())
}

#[test]
fn test_scopes() -> eyre::Result<()> {
    let git = make_git()?;
    git.init_repo()?;
    let config = git.get_config();

    config.set(
        "user.email",
        "global@example.com",
        SetOptions {
            scope: ConfigScope::Global,
            ..Default::default()
        },
    )?;
    assert_eq!(
        config.get_value("user.email", DEFAULT)?.as_deref(),
        Some("global@example.com")
    );
    assert_eq!(config.get_value("user.email", ConfigScope::Local)?, None);

    config.set("user.email", "local@example.com", SetOptions::default())?;
    assert_eq!(
        config.get_value("user.email", DEFAULT)?.as_deref(),
        Some("local@example.com")
    );
    assert_eq!(
        config.get_all("user.email", DEFAULT)?,
        vec!["global@example.com", "local@example.com"]
    );
    assert_eq!(
        config.get_all("user.email", ConfigScope::Global)?,
        vec!["global@example.com"]
    );

    assert!(git.home_path.starts_with(git.temp_dir().path()));
    let global_file = std::fs::read_to_string(git.home_path.join(".gitconfig"))?;
    assert!(global_file.contains("global@example.com"));
    assert!(!global_file.contains("local@example.com"));

    Ok(())
}

#[test]
fn test_sections_ignore_section_name_case() -> eyre::Result<()> {
    let git = make_git()?;
    git.init_repo()?;
    git.run(&["config", "Remote.Origin.URL", "u1"])?;
    git.run(&["config", "remote.upstream.url", "u2"])?;
    let config = git.get_config();

    assert!(config.section_exists("Remote.Origin", DEFAULT)?);
    assert!(config.section_exists("REMOTE", DEFAULT)?);
    assert_eq!(
        config.subsections("Remote", DEFAULT)?,
        vec!["Origin", "upstream"]
    );
    assert_eq!(
        config.subsections("remote", DEFAULT)?,
        config.subsections("REMOTE", DEFAULT)?
    );

    Ok(())
}
