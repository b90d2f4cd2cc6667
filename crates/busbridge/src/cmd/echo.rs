use std::sync::mpsc;

use busbridge_client::{BridgeError, Message};

use crate::cmd::{connect, subscribe, EchoArgs, Endpoint, Event};
use crate::exit::{bridge_error, CliResult, SUCCESS};

pub fn run(args: EchoArgs, endpoint: &Endpoint) -> CliResult<i32> {
    let client = connect(endpoint)?;
    let (tx, rx) = mpsc::channel();
    subscribe(&client, &args.address, tx)?;
    tracing::info!(address = %args.address, "echoing");

    while let Ok(event) = rx.recv() {
        match event {
            Event::Message(message) => echo(&message),
            Event::Error(BridgeError::ServerError(message)) => {
                tracing::warn!(message = %message, "bridge reported an error");
            }
            Event::Error(err) => return Err(bridge_error("echo failed", err)),
            Event::Interrupted => break,
        }
    }

    client.disconnect();
    Ok(SUCCESS)
}

fn echo(message: &Message) {
    match message.reply(message.body(), message.headers().clone()) {
        Ok(()) => tracing::info!(address = %message.address(), "echoed message"),
        Err(BridgeError::NoReplyAddress(address)) => {
            tracing::debug!(address = %address, "message has no reply address; skipping");
        }
        Err(err) => tracing::warn!(error = %err, "echo reply failed"),
    }
}
