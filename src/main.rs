//! SlackBot CLI: converge a host to a SlackBook.

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "slackbot",
    version,
    about = "Provision a host from a YAML SlackBook of apt, file and service tasks"
)]
struct Cli {
    #[command(subcommand)]
    command: slackbot::cli::Commands,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.command.verbose() {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .format_target(false)
        .init();

    if let Err(e) = slackbot::cli::dispatch(cli.command) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
