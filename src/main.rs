use anyhow::Context;
use argh::FromArgs;
use gemsite::{Config, Processor};
use tracing::{event, Level};
use tracing_subscriber::EnvFilter;

#[derive(FromArgs)]
/// Builds a Gemini capsule from a Jekyll site
struct Args {
    #[argh(switch)]
    /// remove the output folder before building
    clean: bool,
    #[argh(switch, short = 'v')]
    /// log debug output
    verbose: bool,
    #[argh(positional)]
    /// path to config file
    config_filename: std::path::PathBuf,
}

fn main() -> anyhow::Result<()> {
    let args = argh::from_env::<Args>();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if args.verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    event!(Level::INFO, r#type = "config", path = ?args.config_filename);
    let cfg = Config::from_file(&args.config_filename)?.resolve(
        args.config_filename
            .parent()
            .context("Parent folder of config file")?,
    )?;
    let processor = Processor::new(cfg);
    processor.build_site(args.clean)?;

    Ok(())
}
