use std::sync::mpsc;
use std::time::Duration;

use busbridge_client::{BridgeError, Response};

use crate::cmd::{connect, parse_duration, Endpoint, SendArgs};
use crate::exit::{bridge_error, CliError, CliResult, INTERNAL, SUCCESS, TIMEOUT};
use crate::output::{print_response, OutputFormat};

// The client's own timer reports the timeout; this only guards against a
// callback that never runs.
const WAIT_GRACE: Duration = Duration::from_secs(2);

enum Outcome {
    Reply(Response),
    Failed(BridgeError),
}

pub fn run(args: SendArgs, endpoint: &Endpoint, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let body = args.body.body()?;
    let headers = args.body.headers()?;
    let client = connect(endpoint)?;

    if !args.wait {
        client
            .send(&args.address, &body, headers)
            .map_err(|err| bridge_error("send failed", err))?;
        client.disconnect();
        return Ok(SUCCESS);
    }

    let (tx, rx) = mpsc::channel();
    let failures = tx.clone();
    client.set_error_handler(move |err| {
        let _ = failures.send(Outcome::Failed(err));
    });
    client
        .request(&args.address, &body, headers, Some(timeout), move |response| {
            let _ = tx.send(Outcome::Reply(response));
        })
        .map_err(|err| bridge_error("send failed", err))?;

    let outcome = rx
        .recv_timeout(timeout + WAIT_GRACE)
        .map_err(|_| CliError::new(INTERNAL, "reply callback never ran"))?;
    client.disconnect();

    match outcome {
        Outcome::Reply(response) => finish(&args.address, &response, timeout, format),
        Outcome::Failed(err) => Err(bridge_error("waiting for reply failed", err)),
    }
}

fn finish(
    address: &str,
    response: &Response,
    timeout: Duration,
    format: OutputFormat,
) -> CliResult<i32> {
    if response.is_timed_out() {
        return Err(CliError::new(
            TIMEOUT,
            format!("no reply from {address} within {timeout:?}"),
        ));
    }
    print_response(response, format);
    Ok(SUCCESS)
}
