#[macro_use]
extern crate tracing;

use std::path::PathBuf;

use structopt::StructOpt;
use tokio::runtime::Builder;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;

use lumistream::models::Config;
use lumistream::pipeline::{Pipeline, PipelineHandle};
use lumistream::session::{Event, Session};

#[derive(Debug, StructOpt)]
struct Opts {
    #[structopt(short, long, parse(from_occurrences))]
    verbose: u32,
    /// Configuration file, defaults to lumistream/config.toml in the user config directory
    #[structopt(short, long = "config")]
    config_path: Option<PathBuf>,
    /// Still image to use as the frame source instead of the test pattern
    #[structopt(long)]
    image: Option<PathBuf>,
    #[structopt(long)]
    dump_config: bool,
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("lumistream").join("config.toml"))
}

fn load_config(opts: &Opts) -> color_eyre::eyre::Result<Config> {
    if let Some(path) = opts.config_path.as_deref() {
        return Ok(Config::read(path)?);
    }

    match default_config_path() {
        Some(path) if path.exists() => Ok(Config::read(&path)?),
        path => {
            info!(path = ?path, "no configuration file, using defaults");
            Ok(Config::default())
        }
    }
}

/// Replace the current process with a fresh copy of itself
fn restart() -> color_eyre::eyre::Result<()> {
    let exe = std::env::current_exe()?;
    warn!(exe = %exe.display(), "restarting");

    tokio::process::Command::new(&exe)
        .args(std::env::args_os().skip(1))
        .spawn()?;

    Ok(())
}

async fn run(opts: Opts, config: Config) -> color_eyre::eyre::Result<()> {
    let restart_on_lost = config.registry.restart_on_lost;
    let autostart = config.capture.autostart;

    let source = lumistream::capture::open_source(opts.image.as_deref(), &config.capture).await?;
    info!(source = %source.name(), "opened frame source");

    let session = Session::new(config);
    let mut events = session.subscribe();
    let handle: PipelineHandle = Pipeline::spawn(session, source).await?;

    if autostart {
        handle.start();
    }

    // Should we continue running?
    let mut restart_requested = false;

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("got ctrl-c, terminating");
                break;
            }
            event = events.recv() => {
                match event {
                    Ok(Event::RestartRequested) if restart_on_lost => {
                        restart_requested = true;
                        break;
                    }
                    Ok(Event::LinkStateChanged(state)) => {
                        debug!(state = %state, "link state");
                    }
                    Ok(Event::DeviceDiscovered { id }) => {
                        info!(id = %id, "device discovered");
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped = %skipped, "skipped events");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    handle.shutdown().await?;

    if restart_requested {
        restart()?;
    }

    Ok(())
}

fn install_tracing(opts: &Opts) -> Result<(), tracing_subscriber::util::TryInitError> {
    use tracing_error::ErrorLayer;
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let fmt_layer = fmt::layer();

    let filter_layer = EnvFilter::try_from_env("LUMISTREAM_LOG").unwrap_or_else(|_| {
        EnvFilter::new(match opts.verbose {
            0 => "lumistream=warn,lumistreamd=warn",
            1 => "lumistream=info,lumistreamd=info",
            2 => "lumistream=debug,lumistreamd=debug",
            _ => "lumistream=trace,lumistreamd=trace",
        })
    });

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .with(ErrorLayer::default())
        .try_init()
}

fn worker_threads(config: &Config) -> usize {
    // One more than the capture threads for the consumer and the transports
    (config.capture.threads as usize + 1).clamp(2, num_cpus::get().max(2))
}

#[paw::main]
fn main(opts: Opts) -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;
    install_tracing(&opts)?;

    let config = load_config(&opts)?;

    // Dump configuration if this was asked
    if opts.dump_config {
        print!("{}", config.to_string()?);
        return Ok(());
    }

    if let Some(path) = opts.image.as_deref().filter(|path| !path.exists()) {
        color_eyre::eyre::bail!("{} does not exist", path.display());
    }

    let rt = Builder::new_multi_thread()
        .worker_threads(worker_threads(&config))
        .enable_all()
        .build()?;
    rt.block_on(run(opts, config))
}
