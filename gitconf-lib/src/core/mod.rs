//! Process-wide settings which are not stored in Git itself.

pub mod env_vars;
