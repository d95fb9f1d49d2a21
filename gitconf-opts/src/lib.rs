//! The command-line options for `gitconf`.

#![warn(missing_docs)]
#![warn(
    clippy::all,
    clippy::as_conversions,
    clippy::clone_on_ref_ptr,
    clippy::dbg_macro
)]
#![allow(clippy::too_many_arguments, clippy::blocks_in_conditions)]

use std::path::{Path, PathBuf};

use clap::{Args, Command as ClapCommand, CommandFactory, Parser};
use lib::git::{ConfigScope, GetOptions, SetOptions};

/// Which configuration file to operate on. When neither flag is given, Git
/// picks the file.
#[derive(Args, Clone, Copy, Debug, Default)]
pub struct ScopeArgs {
    /// Use the global (per-user) configuration file.
    #[clap(action, long = "global", conflicts_with = "local")]
    pub global: bool,

    /// Use the repository's configuration file.
    #[clap(action, long = "local")]
    pub local: bool,
}

impl ScopeArgs {
    /// The scope selected by these flags.
    pub fn scope(&self) -> ConfigScope {
        match (self.global, self.local) {
            (true, _) => ConfigScope::Global,
            (false, true) => ConfigScope::Local,
            (false, false) => ConfigScope::Default,
        }
    }
}

/// Arguments which apply to all commands. Used during setup.
#[derive(Debug, Parser)]
pub struct GlobalArgs {
    /// Change to the given directory before executing the rest of the program.
    /// (The option is called `-C` for symmetry with Git.)
    #[clap(value_parser, short = 'C', global = true)]
    pub working_directory: Option<PathBuf>,
}

/// `gitconf` subcommands.
#[derive(Debug, Parser)]
pub enum Command {
    /// Print the value of a key. Exits with code 1 if it has none.
    Get {
        /// The key to look up, such as `user.name`.
        #[clap(value_parser)]
        key: String,

        /// Print every value of the key, one per line.
        #[clap(action, long = "all")]
        all: bool,

        /// Treat the key as a regular expression, and print `key value` for
        /// every value of every matching key.
        #[clap(action, long = "regexp")]
        regexp: bool,

        /// The configuration file to read.
        #[clap(flatten)]
        scope_args: ScopeArgs,
    },

    /// Write one or more values to a key, replacing its existing values.
    Set {
        /// The key to write, such as `user.name`.
        #[clap(value_parser)]
        key: String,

        /// The values to write, in order.
        #[clap(value_parser, required = true)]
        values: Vec<String>,

        /// Append the values instead of replacing the existing ones.
        #[clap(action, long = "add")]
        add: bool,

        /// With `--add`, skip values which the key already has.
        #[clap(action, long = "unique", requires = "add")]
        unique: bool,

        /// The configuration file to write.
        #[clap(flatten)]
        scope_args: ScopeArgs,
    },

    /// Remove every value of a key, or only the given values. When values
    /// are given, prints the ones which were removed.
    Unset {
        /// The key to remove values from.
        #[clap(value_parser)]
        key: String,

        /// Only remove these exact values.
        #[clap(value_parser)]
        values: Vec<String>,

        /// The configuration file to write.
        #[clap(flatten)]
        scope_args: ScopeArgs,
    },

    /// Print the names of the subsections of a section, one per line.
    Subsections {
        /// The section, such as `remote`.
        #[clap(value_parser)]
        section: String,

        /// The configuration file to read.
        #[clap(flatten)]
        scope_args: ScopeArgs,
    },

    /// Exit with code 0 if the section has any keys, and 1 otherwise.
    SectionExists {
        /// The section, such as `remote.origin`.
        #[clap(value_parser)]
        section: String,

        /// The configuration file to read.
        #[clap(flatten)]
        scope_args: ScopeArgs,
    },

    /// Remove a section and all of its keys.
    RemoveSection {
        /// The section, such as `remote.origin`.
        #[clap(value_parser)]
        section: String,

        /// The configuration file to write.
        #[clap(flatten)]
        scope_args: ScopeArgs,
    },

    /// Rename a section, keeping its keys.
    RenameSection {
        /// The existing section name.
        #[clap(value_parser)]
        section: String,

        /// The new section name.
        #[clap(value_parser)]
        new_name: String,

        /// The configuration file to write.
        #[clap(flatten)]
        scope_args: ScopeArgs,
    },

    /// Run Git with the given arguments, showing its output as it runs.
    Wrap {
        /// The path to the Git executable to use, instead of the one found
        /// in `PATH`.
        #[clap(value_parser, long = "git-executable")]
        git_executable: Option<PathBuf>,

        /// The arguments to pass to Git.
        #[clap(value_parser, trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Install man-pages for `gitconf` to the given directory.
    InstallManPages {
        /// The directory to write `man1` pages into.
        #[clap(value_parser)]
        path: PathBuf,
    },
}

impl Command {
    /// The `GetOptions` described by a `get` command.
    pub fn get_options(all: bool, regexp: bool, scope_args: &ScopeArgs) -> GetOptions {
        GetOptions {
            scope: scope_args.scope(),
            all,
            regex: regexp,
        }
    }

    /// The `SetOptions` described by a `set` command.
    pub fn set_options(add: bool, unique: bool, scope_args: &ScopeArgs) -> SetOptions {
        SetOptions {
            scope: scope_args.scope(),
            add,
            unique,
        }
    }
}

/// Typed access to Git configuration.
#[derive(Debug, Parser)]
#[clap(version = env!("CARGO_PKG_VERSION"))]
pub struct Opts {
    /// Global arguments.
    #[clap(flatten)]
    pub global_args: GlobalArgs,

    /// The `gitconf` subcommand to run.
    #[clap(subcommand)]
    pub command: Command,
}

/// Generate and write man-pages into the specified directory.
///
/// The generated files are named things like `man1/gitconf-get.1`, so this
/// directory should be of the form `path/to/man`, to ensure that these files
/// get generated into the correct `man1` directory.
pub fn write_man_pages(man_dir: &Path) -> std::io::Result<()> {
    let man1_dir = man_dir.join("man1");
    std::fs::create_dir_all(&man1_dir)?;

    // Explicitly set the name here, or else clap thinks that the name of the
    // command is `gitconf-opts`.
    let app = Opts::command().name("gitconf");
    generate_man_page(&man1_dir, "gitconf", &app)?;
    for subcommand in app.get_subcommands() {
        let subcommand_exe_name = format!("gitconf-{}", subcommand.get_name());
        generate_man_page(&man1_dir, &subcommand_exe_name, subcommand)?;
    }
    Ok(())
}

fn generate_man_page(man1_dir: &Path, name: &str, command: &ClapCommand) -> std::io::Result<()> {
    let rendered_man_page = {
        let mut buffer = Vec::new();
        clap_mangen::Man::new(command.clone())
            .title(name)
            .render(&mut buffer)?;
        buffer
    };
    let output_path = man1_dir.join(format!("{name}.1"));
    std::fs::write(output_path, rendered_man_page)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_opts() {
        Opts::command().debug_assert();
    }

    #[test]
    fn test_parse_set() {
        let opts = Opts::parse_from(["gitconf", "set", "--add", "--unique", "--global", "a.b", "x", "y"]);
        match opts.command {
            Command::Set {
                key,
                values,
                add,
                unique,
                scope_args,
            } => {
                assert_eq!(key, "a.b");
                assert_eq!(values, vec!["x", "y"]);
                let options = Command::set_options(add, unique, &scope_args);
                assert_eq!(
                    options,
                    SetOptions {
                        scope: ConfigScope::Global,
                        add: true,
                        unique: true,
                    }
                );
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_scope_flags_conflict() {
        let result = Opts::try_parse_from(["gitconf", "get", "--global", "--local", "a.b"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_wrap() {
        let opts = Opts::parse_from(["gitconf", "-C", "/tmp", "wrap", "log", "--oneline", "-n1"]);
        assert_eq!(opts.global_args.working_directory, Some(PathBuf::from("/tmp")));
        match opts.command {
            Command::Wrap {
                git_executable,
                args,
            } => {
                assert_eq!(git_executable, None);
                assert_eq!(args, vec!["log", "--oneline", "-n1"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
