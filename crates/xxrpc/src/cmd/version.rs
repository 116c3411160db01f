use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("xxrpc {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: xxrpc");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "build_target: {}",
        option_env!("XXRPC_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "features: msgpack={}, async={}, cli=true",
        cfg!(feature = "msgpack"),
        cfg!(feature = "async")
    );
    println!(
        "frame: max_size={}, buffer_size={}",
        xxrpc_frame::DEFAULT_MAX_FRAME_SIZE,
        xxrpc_frame::DEFAULT_BUFFER_SIZE
    );

    Ok(SUCCESS)
}
