//! Read and write Git configuration from the command line.

#![warn(missing_docs)]
#![warn(
    clippy::all,
    clippy::as_conversions,
    clippy::clone_on_ref_ptr,
    clippy::dbg_macro
)]
#![allow(clippy::too_many_arguments, clippy::blocks_in_conditions)]

mod commands;

fn main() {
    gitconf_invoke::invoke_subcommand_main(commands::command_main)
}
