//! Request/reply against a bridge — asks `math.add` for 2 + 3.
//!
//! Run with:
//!   cargo run --example math-client -- 127.0.0.1 7000
//!
//! Something on the bus must answer `math.add` with `{"result": <sum>}`.

use std::sync::mpsc;
use std::time::Duration;

use busbridge::{EventBusClient, Headers};
use serde_json::json;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "127.0.0.1".to_string());
    let port: u16 = args.next().as_deref().unwrap_or("7000").parse()?;

    let client = EventBusClient::new()?;
    client.set_error_handler(|err| eprintln!("bridge error: {err}"));
    client.connect(&host, port)?;

    let (tx, rx) = mpsc::channel();
    client.request(
        "math.add",
        &json!({"a": 2, "b": 3}),
        Headers::new(),
        Some(Duration::from_secs(5)),
        move |response| {
            let _ = tx.send(response);
        },
    )?;

    let response = rx.recv()?;
    match response.body() {
        Some(body) => println!("2 + 3 = {}", body["result"]),
        None => eprintln!("no reply within 5s"),
    }

    client.disconnect();
    Ok(())
}
