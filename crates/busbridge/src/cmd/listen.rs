use std::sync::mpsc;

use busbridge_client::{BridgeError, Headers};

use crate::cmd::{connect, subscribe, Endpoint, Event, ListenArgs};
use crate::exit::{bridge_error, CliResult, SUCCESS};
use crate::output::{print_message, OutputFormat};

pub fn run(args: ListenArgs, endpoint: &Endpoint, format: OutputFormat) -> CliResult<i32> {
    let client = connect(endpoint)?;
    let (tx, rx) = mpsc::channel();
    let id = subscribe(&client, &args.address, tx)?;
    tracing::info!(address = %args.address, "listening");

    let mut printed = 0usize;
    while let Ok(event) = rx.recv() {
        match event {
            Event::Message(message) => {
                print_message(&message, format);
                printed = printed.saturating_add(1);
                if args.count.is_some_and(|count| printed >= count) {
                    break;
                }
            }
            Event::Error(BridgeError::ServerError(message)) => {
                tracing::warn!(message = %message, "bridge reported an error");
            }
            Event::Error(err) => return Err(bridge_error("listen failed", err)),
            Event::Interrupted => break,
        }
    }

    if let Err(err) = client.unregister(&args.address, &id, Headers::new()) {
        tracing::debug!(error = %err, "unregister on exit failed");
    }
    client.disconnect();
    Ok(SUCCESS)
}
