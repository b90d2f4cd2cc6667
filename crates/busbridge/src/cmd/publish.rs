use crate::cmd::{connect, Endpoint, PublishArgs};
use crate::exit::{bridge_error, CliResult, SUCCESS};

pub fn run(args: PublishArgs, endpoint: &Endpoint) -> CliResult<i32> {
    let body = args.body.body()?;
    let headers = args.body.headers()?;
    let client = connect(endpoint)?;

    client
        .publish(&args.address, &body, headers)
        .map_err(|err| bridge_error("publish failed", err))?;
    tracing::info!(address = %args.address, "published");
    client.disconnect();
    Ok(SUCCESS)
}
