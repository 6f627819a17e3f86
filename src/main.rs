use clap::Parser as _;
use multipwm_tools::commands;
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _};

#[derive(clap::Parser)]
#[clap(version, about, author)]
enum Commands {
    Registers(commands::registers::Args),
    Decode(commands::decode::Args),
    Encode(commands::encode::Args),
}

fn end<E: std::error::Error>(r: Result<(), E>) {
    std::process::exit(match r {
        Ok(_) => 0,
        Err(e) => {
            eprintln!("error: {e}");
            let mut cause = e.source();
            while let Some(e) = cause {
                eprintln!("  because: {e}");
                cause = e.source();
            }
            1
        }
    });
}

fn main() {
    let filter = match std::env::var("MULTIPWM_TOOLS_LOG") {
        Err(_) => tracing_subscriber::filter::targets::Targets::new(),
        Ok(description) => match description.parse() {
            Ok(filter) => filter,
            Err(e) => {
                eprintln!("error: could not parse MULTIPWM_TOOLS_LOG: {e}");
                std::process::exit(2);
            }
        },
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
    match Commands::parse() {
        Commands::Registers(args) => end(commands::registers::run(args)),
        Commands::Decode(args) => end(commands::decode::run(args)),
        Commands::Encode(args) => end(commands::encode::run(args)),
    }
}
