//! Clap command tree definition.

use clap::{Arg, ArgAction, Command};

/// Default notebook file when `--db` is not given.
pub const DEFAULT_DB: &str = "notebook.json";

/// Build the complete CLI command tree.
pub fn build_cli() -> Command {
    Command::new("pasta")
        .about("Audit, repair and index PASTA notebooks")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("db")
                .long("db")
                .help("Notebook file (default: notebook.json)")
                .global(true),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .help("Engine config (default: pasta.toml next to the notebook)")
                .global(true),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("JSON output mode")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(build_check())
        .subcommand(build_views())
        .subcommand(build_history())
        .subcommand(build_config())
}

fn build_check() -> Command {
    Command::new("check")
        .about("Audit every document of the notebook")
        .arg(
            Arg::new("repair")
                .long("repair")
                .help("Repair legacy schema shapes and unprefixed names")
                .action(ArgAction::SetTrue),
        )
}

fn build_views() -> Command {
    Command::new("views")
        .about("Compile the type schema into views")
        .arg(
            Arg::new("ensure")
                .long("ensure")
                .help("Only recreate missing design documents")
                .action(ArgAction::SetTrue),
        )
}

fn build_history() -> Command {
    Command::new("history")
        .about("Show the archived revisions of a document")
        .arg(Arg::new("id").required(true).help("Document id"))
}

fn build_config() -> Command {
    Command::new("config")
        .about("Manage the engine config file")
        .subcommand_required(true)
        .subcommand(Command::new("init").about("Write a default pasta.toml if none exists"))
        .subcommand(Command::new("show").about("Print the effective configuration"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_tree_is_consistent() {
        build_cli().debug_assert();
    }

    #[test]
    fn check_flags() {
        let matches = build_cli()
            .try_get_matches_from(["pasta", "--db", "nb.json", "check", "--repair", "--json"])
            .unwrap();
        assert_eq!(matches.get_one::<String>("db").map(String::as_str), Some("nb.json"));
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "check");
        assert!(sub.get_flag("repair"));
        assert!(sub.get_flag("json"));
    }

    #[test]
    fn history_requires_id() {
        assert!(build_cli().try_get_matches_from(["pasta", "history"]).is_err());
    }
}
