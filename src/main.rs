use clap::Parser as _;
use airtouch_tools::commands;
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _};

const LOG_ENV: &str = "AIRTOUCH_TOOLS_LOG";

#[derive(clap::Parser)]
#[clap(version, about, author)]
enum Commands {
    Fields(commands::fields::Args),
    Status(commands::status::Args),
    Groups(commands::groups::Args),
    SetMode(commands::set_mode::Args),
    SetGroupTemperature(commands::set_group_temperature::Args),
    Patch(commands::patch::Args),
    Statistics(commands::statistics::Args),
    Frame(commands::frame::Args),
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
    let filter_description = std::env::var(LOG_ENV).unwrap_or_else(|_| "warn".to_string());
    let filter = match filter_description.parse::<tracing_subscriber::filter::targets::Targets>() {
        Ok(filter) => filter,
        Err(e) => {
            eprintln!("warning: ignoring {LOG_ENV}=`{filter_description}`: {e}");
            tracing_subscriber::filter::targets::Targets::new()
                .with_default(tracing::level_filters::LevelFilter::WARN)
        }
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
    match Commands::parse() {
        Commands::Fields(args) => end(commands::fields::run(args)),
        Commands::Status(args) => end(commands::status::run(args)),
        Commands::Groups(args) => end(commands::groups::run(args)),
        Commands::SetMode(args) => end(commands::set_mode::run(args)),
        Commands::SetGroupTemperature(args) => end(commands::set_group_temperature::run(args)),
        Commands::Patch(args) => end(commands::patch::run(args)),
        Commands::Statistics(args) => end(commands::statistics::run(args)),
        Commands::Frame(args) => end(commands::frame::run(args)),
    }
}
