use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("dmlcap {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: dmlcap");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("DMLCAP_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "frame_max_payload: {}",
        dmlcap_frame::DEFAULT_MAX_PAYLOAD
    );
    println!(
        "default_queue_capacity: {}",
        dmlcap_pipeline::DEFAULT_QUEUE_CAPACITY
    );
    println!("features: cli=true");

    Ok(SUCCESS)
}
