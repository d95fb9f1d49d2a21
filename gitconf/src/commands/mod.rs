//! Sub-commands of `gitconf`.

mod config;
mod wrap;

use std::io::{stderr, stdout};

use gitconf_invoke::CommandContext;
use gitconf_opts::{write_man_pages, Command, Opts};
use lib::git::{GitConfig, GitRunInfo};
use lib::util::EyreExitOr;

/// Run the subcommand described by `opts`.
pub fn command_main(ctx: CommandContext, opts: Opts) -> EyreExitOr<()> {
    let CommandContext { git_run_info } = ctx;
    let Opts {
        global_args: _,
        command,
    } = opts;

    let git_config = GitConfig::new(&git_run_info);
    let mut stdout = stdout();
    let mut stderr = stderr();

    match command {
        Command::Get {
            key,
            all,
            regexp,
            scope_args,
        } => config::get(
            &git_config,
            &mut stdout,
            &key,
            Command::get_options(all, regexp, &scope_args),
        ),

        Command::Set {
            key,
            values,
            add,
            unique,
            scope_args,
        } => config::set(
            &git_config,
            &mut stderr,
            &key,
            values,
            Command::set_options(add, unique, &scope_args),
        ),

        Command::Unset {
            key,
            values,
            scope_args,
        } => config::unset(
            &git_config,
            &mut stdout,
            &mut stderr,
            &key,
            values,
            scope_args.scope(),
        ),

        Command::Subsections {
            section,
            scope_args,
        } => config::subsections(&git_config, &mut stdout, &section, scope_args.scope()),

        Command::SectionExists {
            section,
            scope_args,
        } => config::section_exists(&git_config, &section, scope_args.scope()),

        Command::RemoveSection {
            section,
            scope_args,
        } => config::remove_section(&git_config, &mut stderr, &section, scope_args.scope()),

        Command::RenameSection {
            section,
            new_name,
            scope_args,
        } => config::rename_section(
            &git_config,
            &mut stderr,
            &section,
            &new_name,
            scope_args.scope(),
        ),

        Command::Wrap {
            git_executable: explicit_git_executable,
            args,
        } => {
            let git_run_info = match explicit_git_executable {
                Some(path_to_git) => GitRunInfo {
                    path_to_git,
                    ..git_run_info
                },
                None => git_run_info,
            };
            wrap::wrap(&git_run_info, args)
        }

        Command::InstallManPages { path } => {
            write_man_pages(&path)?;
            Ok(Ok(()))
        }
    }
}
