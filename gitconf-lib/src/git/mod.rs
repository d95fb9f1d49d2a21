//! Tools for interfacing with the Git executable.

mod config;
mod run;

pub use config::{
    escape_pattern, parse_regexp_output, ConfigLookup, ConfigScope, ConfigValues, GetOptions,
    GitConfig, SetOptions,
};
pub use run::{
    command_line, flatten_args, CommandError, Error, GitArg, GitExecutor, GitRunInfo,
    GitRunResult, Result, StreamCompletion,
};
