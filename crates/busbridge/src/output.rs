use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use busbridge_client::{Headers, Message, Response};
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    address: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_address: Option<&'a str>,
    headers: &'a Headers,
    body: &'a Value,
    timestamp: String,
}

impl<'a> MessageOutput<'a> {
    fn from_message(message: &'a Message) -> Self {
        Self {
            address: message.address(),
            reply_address: message.reply_address(),
            headers: message.headers(),
            body: message.body(),
            timestamp: now_unix_seconds(),
        }
    }
}

pub fn print_message(message: &Message, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = MessageOutput::from_message(message);
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ADDRESS", "REPLY TO", "HEADERS", "BODY"])
                .add_row(vec![
                    message.address().to_string(),
                    message.reply_address().unwrap_or("-").to_string(),
                    compact(&Value::Object(message.headers().clone())),
                    compact(message.body()),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("address: {}", message.address());
            if let Some(reply_address) = message.reply_address() {
                println!("reply_to: {reply_address}");
            }
            for (key, value) in message.headers() {
                println!("header {key}: {}", compact(value));
            }
            println!(
                "{}",
                serde_json::to_string_pretty(message.body()).unwrap_or_default()
            );
        }
        OutputFormat::Raw => print_raw(message.body()),
    }
}

/// Print a reply; a timed-out response prints nothing.
pub fn print_response(response: &Response, format: OutputFormat) {
    if let Some(message) = response.message() {
        print_message(message, format);
    }
}

/// Body as bare text: strings unquoted, everything else as JSON.
pub fn print_raw(body: &Value) {
    let mut out = std::io::stdout();
    let _ = match body {
        Value::String(text) => writeln!(out, "{text}"),
        other => writeln!(out, "{}", compact(other)),
    };
    let _ = out.flush();
}

fn compact(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
