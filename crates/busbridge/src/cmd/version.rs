use busbridge_client::config::{DEFAULT_PING_INTERVAL, DEFAULT_REQUEST_TIMEOUT};
use busbridge_frame::DEFAULT_MAX_PAYLOAD;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("busbridge {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: busbridge");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "build_target: {}",
        option_env!("BUSBRIDGE_BUILD_TARGET").unwrap_or("unknown")
    );
    println!(
        "build_profile: {}",
        option_env!("BUSBRIDGE_BUILD_PROFILE").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("features: async={}, cli=true", cfg!(feature = "async"));
    println!("max_payload_bytes: {DEFAULT_MAX_PAYLOAD}");
    println!("ping_interval_ms: {}", DEFAULT_PING_INTERVAL.as_millis());
    println!("request_timeout_ms: {}", DEFAULT_REQUEST_TIMEOUT.as_millis());

    Ok(SUCCESS)
}
