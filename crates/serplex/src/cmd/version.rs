use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("serplex {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: serplex");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "build_target: {}",
        option_env!("SERPLEX_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "queue_capacity: {}",
        serplex_driver::DEFAULT_QUEUE_CAPACITY
    );
    println!(
        "flush_interval: {:?}",
        serplex_driver::DEFAULT_FLUSH_INTERVAL
    );
    println!(
        "max_frame: {}",
        serplex_frame::DEFAULT_MAX_FRAME
    );
    println!("features: async={}, cli=true", cfg!(feature = "async"));

    Ok(SUCCESS)
}
