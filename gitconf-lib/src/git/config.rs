//! Read and write Git configuration by invoking `git config`.
//!
//! Reads never fail because a key is missing: a lookup which Git rejects for
//! any reason (the key is unset, or is not even a valid key) is reported as
//! an absent value. Writes and section operations surface Git's failures as
//! [`CommandError`](super::CommandError)s.
//!
//! Operations which read before they write (`set` with `unique`,
//! `unset_matching`) are not atomic with respect to other processes editing
//! the same configuration file concurrently.

use indexmap::IndexMap;
use itertools::Itertools;
use tracing::{debug, instrument, warn};

use super::run::{Error, GitArg, GitExecutor, Result};
use crate::git_args;

/// Which configuration file an operation targets.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ConfigScope {
    /// Let Git decide. Reads consult every applicable file, with the most
    /// specific one winning; writes go to the repository's file.
    #[default]
    Default,

    /// The repository's `.git/config`.
    Local,

    /// The user's `~/.gitconfig`.
    Global,
}

impl ConfigScope {
    /// The `git config` flag selecting this scope, if any.
    pub fn flag(self) -> Option<&'static str> {
        match self {
            ConfigScope::Default => None,
            ConfigScope::Local => Some("--local"),
            ConfigScope::Global => Some("--global"),
        }
    }
}

/// Options for [`GitConfig::get`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct GetOptions {
    /// The file to read from.
    pub scope: ConfigScope,

    /// Return every value of the key rather than only the last one.
    pub all: bool,

    /// Treat the key as a regular expression and return every matching key
    /// with its values. Takes precedence over `all`.
    pub regex: bool,
}

/// Options for [`GitConfig::set`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// The file to write to.
    pub scope: ConfigScope,

    /// Append the values instead of replacing any existing values.
    pub add: bool,

    /// When appending, skip values which the key already has.
    pub unique: bool,
}

/// The result of [`GitConfig::get`], shaped by the `GetOptions` used.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigLookup {
    /// The last value of the key, if it has one.
    Value(Option<String>),

    /// Every value of the key, in file order.
    All(Vec<String>),

    /// Every key matching the pattern, with its values.
    Matches(IndexMap<String, Vec<String>>),
}

impl ConfigLookup {
    /// Whether the lookup found nothing.
    pub fn is_empty(&self) -> bool {
        match self {
            ConfigLookup::Value(value) => value.is_none(),
            ConfigLookup::All(values) => values.is_empty(),
            ConfigLookup::Matches(matches) => matches.is_empty(),
        }
    }
}

/// One or more values to write to or remove from a key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfigValues(pub Vec<String>);

impl From<&str> for ConfigValues {
    fn from(value: &str) -> Self {
        ConfigValues(vec![value.to_string()])
    }
}

impl From<String> for ConfigValues {
    fn from(value: String) -> Self {
        ConfigValues(vec![value])
    }
}

impl From<bool> for ConfigValues {
    fn from(value: bool) -> Self {
        ConfigValues(vec![value.to_string()])
    }
}

impl<T: Into<String>> From<Vec<T>> for ConfigValues {
    fn from(values: Vec<T>) -> Self {
        ConfigValues(values.into_iter().map(Into::into).collect())
    }
}

impl<T: AsRef<str>> From<&[T]> for ConfigValues {
    fn from(values: &[T]) -> Self {
        ConfigValues(values.iter().map(|value| value.as_ref().to_string()).collect())
    }
}

impl<T: Into<String>, const N: usize> From<[T; N]> for ConfigValues {
    fn from(values: [T; N]) -> Self {
        ConfigValues(values.into_iter().map(Into::into).collect())
    }
}

/// Parse the output of `git config --get-regexp`: one `key value` binding per
/// line, split at the first space. A key may appear on several lines; its
/// values are collected in the order they were printed. A line without a
/// space is a key with no value (a bare boolean), recorded as an empty
/// string.
pub fn parse_regexp_output(output: &str) -> IndexMap<String, Vec<String>> {
    let mut result: IndexMap<String, Vec<String>> = IndexMap::new();
    for line in output.lines() {
        if line.is_empty() {
            continue;
        }
        let (key, value) = line.split_once(' ').unwrap_or((line, ""));
        result
            .entry(key.to_string())
            .or_default()
            .push(value.to_string());
    }
    result
}

/// Escape `text` so that it matches literally in a POSIX extended regular
/// expression, which is the dialect `git config` uses for key and value
/// patterns.
pub fn escape_pattern(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(
            c,
            '.' | '[' | ']' | '{' | '}' | '(' | ')' | '\\' | '*' | '+' | '?' | '^' | '$' | '|'
        ) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Typed access to the configuration seen by Git.
#[derive(Clone, Debug)]
pub struct GitConfig<E> {
    executor: E,
}

impl<E: GitExecutor> GitConfig<E> {
    /// Constructor.
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    /// The executor used to run Git.
    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Run a read-only `git config` query. A `CommandError` is a miss; only
    /// a failure to run Git at all is propagated.
    fn query(&self, args: &[GitArg]) -> Result<Option<String>> {
        match self.executor.exec(args) {
            Ok(output) => Ok(Some(output)),
            Err(Error::Command(err)) => {
                if err.exit_code.0 != 1 {
                    // Exit code 1 is Git's "not found"; anything else is a
                    // malformed key or unreadable file, reported as a miss
                    // all the same.
                    warn!(?err, "Config lookup failed, treating as absent");
                }
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Look up `key` as directed by `options`. See [`GitConfig::get_value`],
    /// [`GitConfig::get_all`] and [`GitConfig::get_regexp`] for the three
    /// modes.
    #[instrument(skip(self))]
    pub fn get(&self, key: &str, options: GetOptions) -> Result<ConfigLookup> {
        let GetOptions { scope, all, regex } = options;
        let lookup = if regex {
            ConfigLookup::Matches(self.get_regexp(key, scope)?)
        } else if all {
            ConfigLookup::All(self.get_all(key, scope)?)
        } else {
            ConfigLookup::Value(self.get_value(key, scope)?)
        };
        Ok(lookup)
    }

    /// Get the last value of `key`, or `None` if it can't be read.
    #[instrument(skip(self))]
    pub fn get_value(&self, key: &str, scope: ConfigScope) -> Result<Option<String>> {
        self.query(&git_args!["config", scope.flag(), "--get", key])
    }

    /// Get every value of `key` in the order Git reports them. Empty if it
    /// can't be read.
    #[instrument(skip(self))]
    pub fn get_all(&self, key: &str, scope: ConfigScope) -> Result<Vec<String>> {
        let output = self.query(&git_args!["config", scope.flag(), "--get-all", key])?;
        let values = match output {
            Some(output) => output.split('\n').map(str::to_string).collect(),
            None => Vec::new(),
        };
        Ok(values)
    }

    /// Get every key matching the regular expression `pattern`, mapped to its
    /// values. Keys appear in the order Git first reports them.
    #[instrument(skip(self))]
    pub fn get_regexp(
        &self,
        pattern: &str,
        scope: ConfigScope,
    ) -> Result<IndexMap<String, Vec<String>>> {
        let output = self.query(&git_args!["config", scope.flag(), "--get-regexp", pattern])?;
        Ok(output
            .map(|output| parse_regexp_output(&output))
            .unwrap_or_default())
    }

    /// Write `values` to `key`, one `git config --add` per value, in order.
    ///
    /// Unless `options.add` is set, every existing value of the key in the
    /// scope is removed first; a key with no values is not an error. With
    /// `options.add` and `options.unique`, values the key already has are
    /// skipped, and a value repeated in `values` is written once.
    ///
    /// Returns the values which were requested, whether or not each one
    /// changed the configuration.
    #[instrument(skip(self, values))]
    pub fn set(
        &self,
        key: &str,
        values: impl Into<ConfigValues>,
        options: SetOptions,
    ) -> Result<Vec<String>> {
        let SetOptions { scope, add, unique } = options;
        let ConfigValues(values) = values.into();
        debug!(?values, "Setting config");

        let to_write: Vec<&String> = if !add {
            let cleared =
                self.executor
                    .exec_succeeded(&git_args!["config", scope.flag(), "--unset-all", key])?;
            if !cleared {
                debug!(%key, "No prior values to clear");
            }
            values.iter().collect()
        } else if unique {
            let existing = self.get_all(key, scope)?;
            values
                .iter()
                .filter(|value| !existing.contains(*value))
                .unique()
                .collect()
        } else {
            values.iter().collect()
        };

        for value in to_write {
            self.executor
                .exec(&git_args!["config", scope.flag(), "--add", key, value])?;
        }
        Ok(values)
    }

    /// Remove every value of `key`. Fails if the key has no values.
    #[instrument(skip(self))]
    pub fn unset(&self, key: &str, scope: ConfigScope) -> Result<()> {
        self.executor
            .exec(&git_args!["config", scope.flag(), "--unset-all", key])?;
        Ok(())
    }

    /// Remove exactly those of `values` which `key` currently has, leaving
    /// its other values in place. Returns the values removed.
    #[instrument(skip(self, values))]
    pub fn unset_matching(
        &self,
        key: &str,
        values: impl Into<ConfigValues>,
        scope: ConfigScope,
    ) -> Result<Vec<String>> {
        let ConfigValues(values) = values.into();
        let existing = self.get_all(key, scope)?;
        let to_remove = values
            .into_iter()
            .filter(|value| existing.contains(value))
            .unique()
            .collect_vec();
        for value in &to_remove {
            let value_pattern = format!("^{}$", escape_pattern(value));
            self.executor.exec(&git_args![
                "config",
                scope.flag(),
                "--unset-all",
                key,
                value_pattern
            ])?;
        }
        Ok(to_remove)
    }

    fn section_pattern(section: &str) -> String {
        format!("^{}\\.", escape_pattern(section))
    }

    /// List the subsections of `section`: for keys `remote.origin.url` and
    /// `remote.origin.fetch`, the subsections of `remote` are `["origin"]`.
    /// Each name appears once, in the order Git first reports it. Keys
    /// directly inside `section` contribute nothing.
    #[instrument(skip(self))]
    pub fn subsections(&self, section: &str, scope: ConfigScope) -> Result<Vec<String>> {
        // Git reports section names in lowercase.
        let prefix = match section.split_once('.') {
            Some((name, subsection)) => format!("{}.{subsection}.", name.to_lowercase()),
            None => format!("{}.", section.to_lowercase()),
        };
        let matches = self.get_regexp(&Self::section_pattern(section), scope)?;
        let subsections = matches
            .keys()
            .filter_map(|key| {
                let rest = key.strip_prefix(&prefix)?;
                let (subsection, _name) = rest.rsplit_once('.')?;
                Some(subsection.to_string())
            })
            .unique()
            .collect();
        Ok(subsections)
    }

    /// Whether any key in `section` (or its subsections) has a value.
    #[instrument(skip(self))]
    pub fn section_exists(&self, section: &str, scope: ConfigScope) -> Result<bool> {
        let matches = self.get_regexp(&Self::section_pattern(section), scope)?;
        Ok(!matches.is_empty())
    }

    /// Remove `section` and every key in it. Fails if there is no such
    /// section.
    #[instrument(skip(self))]
    pub fn remove_section(&self, section: &str, scope: ConfigScope) -> Result<()> {
        self.executor
            .exec(&git_args!["config", scope.flag(), "--remove-section", section])?;
        Ok(())
    }

    /// Rename `section` to `new_name`, keeping its keys. Git refuses if the
    /// section does not exist.
    #[instrument(skip(self))]
    pub fn rename_section(&self, section: &str, new_name: &str, scope: ConfigScope) -> Result<()> {
        self.executor.exec(&git_args![
            "config",
            scope.flag(),
            "--rename-section",
            section,
            new_name
        ])?;
        Ok(())
    }
}
