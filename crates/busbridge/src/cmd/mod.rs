use std::sync::mpsc::Sender;
use std::time::Duration;

use busbridge_client::{BridgeError, ClientConfig, EventBusClient, Headers, Message};
use clap::{Args, Subcommand};
use serde_json::Value;

use crate::exit::{bridge_error, CliError, CliResult, INTERNAL};
use crate::output::OutputFormat;

pub mod echo;
pub mod listen;
pub mod publish;
pub mod send;
pub mod version;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send a point-to-point message, optionally waiting for the reply.
    Send(SendArgs),
    /// Publish a message to every subscriber of an address.
    Publish(PublishArgs),
    /// Register on an address and print received messages.
    Listen(ListenArgs),
    /// Register on an address and reply to each message with its own body.
    Echo(EchoArgs),
    /// Show version information.
    Version(VersionArgs),
}

/// Where the bridge lives.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

pub fn run(command: Command, endpoint: &Endpoint, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args, endpoint, format),
        Command::Publish(args) => publish::run(args, endpoint),
        Command::Listen(args) => listen::run(args, endpoint, format),
        Command::Echo(args) => echo::run(args, endpoint),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct BodyArgs {
    /// JSON body.
    #[arg(long, conflicts_with = "data")]
    pub json: Option<String>,
    /// String body.
    #[arg(long, conflicts_with = "json")]
    pub data: Option<String>,
    /// Header as key=value (repeatable).
    #[arg(long = "header", value_name = "KEY=VALUE")]
    pub headers: Vec<String>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Destination address.
    pub address: String,
    #[command(flatten)]
    pub body: BodyArgs,
    /// Wait for the reply and print it.
    #[arg(long)]
    pub wait: bool,
    /// Reply timeout when --wait is set (e.g. 30s, 500ms).
    #[arg(long, default_value = "30s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct PublishArgs {
    /// Destination address.
    pub address: String,
    #[command(flatten)]
    pub body: BodyArgs,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Address to register on.
    pub address: String,
    /// Exit after receiving N messages.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    /// Address to register on.
    pub address: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

impl BodyArgs {
    pub fn body(&self) -> CliResult<Value> {
        if let Some(json) = &self.json {
            return serde_json::from_str(json)
                .map_err(|err| CliError::usage(format!("--json is not valid JSON: {err}")));
        }
        Ok(self.data.clone().map_or(Value::Null, Value::String))
    }

    pub fn headers(&self) -> CliResult<Headers> {
        parse_headers(&self.headers)
    }
}

pub fn parse_headers(pairs: &[String]) -> CliResult<Headers> {
    let mut headers = Headers::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(CliError::usage(format!(
                "header must be KEY=VALUE, got: {pair}"
            )));
        };
        if key.is_empty() {
            return Err(CliError::usage(format!("header key is empty: {pair}")));
        }
        headers.insert(key.to_string(), Value::String(value.to_string()));
    }
    Ok(headers)
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::usage("duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::usage(format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::usage("duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

pub fn connect(endpoint: &Endpoint) -> CliResult<EventBusClient> {
    let client = EventBusClient::with_config(ClientConfig {
        connect_timeout: Some(CONNECT_TIMEOUT),
        ..ClientConfig::default()
    })
    .map_err(|err| bridge_error("client setup failed", err))?;

    client
        .connect(&endpoint.host, endpoint.port)
        .map_err(|err| {
            bridge_error(
                &format!("connect to {}:{} failed", endpoint.host, endpoint.port),
                err,
            )
        })?;
    tracing::debug!(host = %endpoint.host, port = endpoint.port, "connected");
    Ok(client)
}

/// Something a long-running subscription command has to react to.
pub enum Event {
    Message(Message),
    Error(BridgeError),
    Interrupted,
}

/// Route messages on `address`, client errors and Ctrl-C into `events`.
pub fn subscribe(
    client: &EventBusClient,
    address: &str,
    events: Sender<Event>,
) -> CliResult<String> {
    let errors = events.clone();
    client.set_error_handler(move |err| {
        let _ = errors.send(Event::Error(err));
    });

    let interrupts = events.clone();
    ctrlc::set_handler(move || {
        let _ = interrupts.send(Event::Interrupted);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))?;

    client
        .register(address, None, Headers::new(), move |message| {
            let _ = events.send(Event::Message(message));
        })
        .map_err(|err| bridge_error("register failed", err))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::exit::USAGE;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert_eq!(parse_duration("0s").unwrap_err().code, USAGE);
        assert_eq!(parse_duration("bad").unwrap_err().code, USAGE);
        assert_eq!(parse_duration("").unwrap_err().code, USAGE);
    }

    #[test]
    fn headers_split_on_first_equals() {
        let headers =
            parse_headers(&["trace=abc".to_string(), "expr=a=b".to_string()]).unwrap();
        assert_eq!(headers.get("trace"), Some(&json!("abc")));
        assert_eq!(headers.get("expr"), Some(&json!("a=b")));

        assert!(parse_headers(&["novalue".to_string()]).is_err());
        assert!(parse_headers(&["=x".to_string()]).is_err());
    }

    #[test]
    fn body_prefers_json_then_data() {
        let args = BodyArgs {
            json: Some("{\"a\":1}".to_string()),
            data: None,
            headers: Vec::new(),
        };
        assert_eq!(args.body().unwrap(), json!({"a": 1}));

        let args = BodyArgs {
            json: None,
            data: Some("hello".to_string()),
            headers: Vec::new(),
        };
        assert_eq!(args.body().unwrap(), json!("hello"));

        let args = BodyArgs {
            json: Some("{".to_string()),
            data: None,
            headers: Vec::new(),
        };
        assert_eq!(args.body().unwrap_err().code, USAGE);
    }
}
