mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::{Command, Endpoint};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "busbridge", version, about = "Event bus bridge CLI")]
struct Cli {
    /// Bridge host.
    #[arg(long, env = "BUSBRIDGE_HOST", default_value = "127.0.0.1", global = true)]
    host: String,

    /// Bridge port.
    #[arg(long, env = "BUSBRIDGE_PORT", default_value_t = 7000, global = true)]
    port: u16,

    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "warn", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let endpoint = Endpoint {
        host: cli.host,
        port: cli.port,
    };

    match cmd::run(cli.command, &endpoint, format) {
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

    #[test]
    fn parses_send_with_headers() {
        let cli = Cli::try_parse_from([
            "busbridge",
            "--port",
            "7001",
            "send",
            "math.add",
            "--json",
            "{\"a\":2}",
            "--header",
            "trace=abc",
            "--wait",
        ])
        .expect("send args should parse");

        assert_eq!(cli.port, 7001);
        match cli.command {
            Command::Send(args) => {
                assert_eq!(args.address, "math.add");
                assert_eq!(args.body.headers, vec!["trace=abc".to_string()]);
                assert!(args.wait);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_conflicting_body_args() {
        let err = Cli::try_parse_from([
            "busbridge",
            "publish",
            "news",
            "--json",
            "{\"x\":1}",
            "--data",
            "hello",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn global_flags_follow_subcommand() {
        let cli = Cli::try_parse_from(["busbridge", "listen", "news", "--host", "bridge.local"])
            .expect("listen args should parse");
        assert_eq!(cli.host, "bridge.local");
        assert!(matches!(cli.command, Command::Listen(_)));
    }
}
