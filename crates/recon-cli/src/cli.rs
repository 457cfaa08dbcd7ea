//! Argument definitions for the `recon` binary

use clap::{value_parser, Arg, ArgAction, Command};
use std::path::PathBuf;

fn request_arg() -> Arg {
    Arg::new("request")
        .long("request")
        .short('r')
        .value_parser(value_parser!(PathBuf))
        .help("Request JSON file ({env, changes[]}); reads stdin when omitted or '-'")
}

/// Full command tree
#[must_use]
pub fn build_cli() -> Command {
    Command::new("recon")
        .version(recon_core::VERSION)
        .about("Reconcile runtime config changes against live state, open PRs and git")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML config file; environment variables override it"),
        )
        .arg(
            Arg::new("remote")
                .long("remote")
                .global(true)
                .help("Send phases to this reconciliation router instead of running them here"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines on stderr"),
        )
        .subcommand(
            Command::new("check-live")
                .about("Phase 0: is the change already live?")
                .arg(request_arg()),
        )
        .subcommand(
            Command::new("check-open-pr")
                .about("Phase 1: does an open PR already carry the change?")
                .arg(request_arg()),
        )
        .subcommand(
            Command::new("ensure-pr")
                .about("Phase 2: reuse a matching PR or open a new one")
                .arg(request_arg()),
        )
        .subcommand(
            Command::new("get-file")
                .about("Print a file from the config repository")
                .arg(
                    Arg::new("ref")
                        .long("ref")
                        .required(true)
                        .help("Branch, tag or SHA"),
                )
                .arg(
                    Arg::new("path")
                        .long("path")
                        .required(true)
                        .help("Repository path"),
                ),
        )
        .subcommand(
            Command::new("publish-canonical")
                .about("Publish the live branch documents to the runtime store"),
        )
        .subcommand(
            Command::new("run-plan")
                .about("Propose and confirm a plan end to end, printing every event")
                .arg(
                    Arg::new("proposal")
                        .long("proposal")
                        .short('p')
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("File holding the assistant's proposal text"),
                )
                .arg(
                    Arg::new("chat")
                        .long("chat")
                        .help("Chat id to file the plan under (random when omitted)"),
                ),
        )
        .subcommand(
            Command::new("schema")
                .about("Print a JSON schema")
                .arg(
                    Arg::new("kind")
                        .long("kind")
                        .default_value("proposal")
                        .value_parser(["proposal", "change-set"])
                        .help("Which document to describe"),
                ),
        )
}
