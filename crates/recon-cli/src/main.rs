use recon_cli::{build_cli, commands, logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = build_cli().get_matches();
    let log_json = matches
        .subcommand()
        .is_some_and(|(_, args)| args.get_flag("log-json"));
    logging::init(log_json);

    commands::run(&matches).await
}
