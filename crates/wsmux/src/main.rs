mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::LoggingArgs;
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "wsmux",
    version,
    about = "Multiplexed real-time subscription client"
)]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    #[command(flatten)]
    logging: LoggingArgs,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    cli.logging.init();

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::TopicArg;
    use crate::logging::LogLevel;

    #[test]
    fn parses_subscribe_subcommand() {
        let cli = Cli::try_parse_from([
            "wsmux",
            "subscribe",
            "http://localhost:8090/",
            "--topic",
            "parameters",
            "--parameter",
            "/a/b",
            "--parameter",
            "/a/c",
            "--count",
            "10",
        ])
        .expect("subscribe args should parse");

        let Command::Subscribe(args) = cli.command else {
            panic!("expected subscribe");
        };
        assert_eq!(args.topic, TopicArg::Parameters);
        assert_eq!(args.parameters, vec!["/a/b", "/a/c"]);
        assert_eq!(args.count, Some(10));
        assert_eq!(args.reconnect_interval, "1s");
    }

    #[test]
    fn kebab_case_topic_names() {
        let cli = Cli::try_parse_from([
            "wsmux",
            "subscribe",
            "ws://localhost:8090/_websocket",
            "--topic",
            "command-queue-events",
        ])
        .expect("topic should parse");
        assert!(matches!(
            cli.command,
            Command::Subscribe(ref args) if args.topic == TopicArg::CommandQueueEvents
        ));
    }

    #[test]
    fn rejects_unknown_topic() {
        let err = Cli::try_parse_from([
            "wsmux",
            "subscribe",
            "http://localhost:8090/",
            "--topic",
            "telemetry",
        ])
        .expect_err("unknown topic should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }

    #[test]
    fn parses_info_with_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "wsmux",
            "info",
            "http://localhost:8090/",
            "--timeout",
            "3s",
            "--log-level",
            "debug",
        ])
        .expect("info args should parse");
        assert!(matches!(cli.command, Command::Info(_)));
        assert!(matches!(cli.logging.level, LogLevel::Debug));
    }
}
