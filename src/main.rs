use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use color_eyre::Result;
use hyprtask::commands::Command;
use hyprtask::config::{self, load_config, load_config_from_path};
use hyprtask::pipeline::{Collaborators, Pipeline};
use hyprtask::publish::{Publisher, bounded};
use hyprtask::system::enumerator::UserCache;
use hyprtask::system::kill::SysinfoSignaller;
use hyprtask::system::platform;
use hyprtask::view::DisplayData;
use hyprtask::{logging, render, window};
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "hyprtask",
    about = "Workspace-aware process monitor for Hyprland"
)]
struct Cli {
    /// Path to config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Poll interval in milliseconds
    #[arg(long)]
    refresh_rate: Option<u64>,

    /// CPU sampling window in milliseconds
    #[arg(long)]
    sample_interval: Option<u64>,

    /// Tracking mode: all, windowed
    #[arg(long)]
    mode: Option<String>,

    /// Initial sort key: none, pid, name, user, cpu, mem
    #[arg(long)]
    sort: Option<String>,

    /// Initial sort order: none, asc, desc
    #[arg(long)]
    order: Option<String>,

    /// Exit after this many seconds
    #[arg(long)]
    run_for: Option<u64>,

    /// Print display data as JSON lines
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Process rows to print under each summary line
    #[arg(long, default_value_t = 0)]
    rows: usize,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let config = load_config_for_cli(&cli);
    config.validate()?;
    logging::init(&config.logging, cli.json)?;

    let collaborators = Collaborators {
        source: platform::open()?,
        windows: window::detect(),
        signaller: Arc::new(SysinfoSignaller::new()),
        users: Arc::new(UserCache::default()),
    };
    let mut pipeline = Pipeline::build(&config, collaborators)?;
    pipeline.start_polling();

    let (quit, quit_rx) = bounded(1, "quit");
    spawn_stdin_reader(
        pipeline.actions.clone(),
        pipeline.terminations.clone(),
        quit,
    );

    let result = run(&mut pipeline, quit_rx, &cli).await;
    pipeline.shutdown();
    info!("shutdown");
    result
}

async fn run(pipeline: &mut Pipeline, mut quit: mpsc::Receiver<()>, cli: &Cli) -> Result<()> {
    let run_for = cli.run_for.map(Duration::from_secs);
    let deadline = async {
        match run_for {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            data = pipeline.display.recv() => match data {
                Some(data) => print_display(&data, cli)?,
                None => break,
            },
            Some(()) = quit.recv() => {
                info!("quit requested");
                break;
            }
            _ = &mut deadline => {
                info!(seconds = cli.run_for, "run time elapsed");
                break;
            }
        }
    }
    Ok(())
}

fn print_display(data: &DisplayData, cli: &Cli) -> Result<()> {
    if cli.json {
        println!("{}", render::json_line(data)?);
    } else if cli.rows > 0 {
        print!("{}", render::summary(data, cli.rows));
    } else {
        println!("{}", render::header(data));
    }
    Ok(())
}

/// Forwards stdin commands into the pipeline without ever blocking on a
/// full queue.
fn spawn_stdin_reader(
    actions: Publisher<hyprtask::view::ViewAction>,
    terminations: Publisher<hyprtask::monitor::TerminationRequest>,
    quit: Publisher<()>,
) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<Command>() {
                Ok(Command::View(action)) => {
                    actions.publish(action);
                }
                Ok(Command::Terminate(request)) => {
                    terminations.publish(request);
                }
                Ok(Command::Quit) => {
                    quit.publish(());
                    break;
                }
                Err(err) => warn!(line = %line, error = %err, "ignoring command"),
            }
        }
    });
}

fn load_config_for_cli(cli: &Cli) -> config::Config {
    let mut config = match &cli.config {
        Some(path) => load_config_from_path(path),
        None => load_config(),
    };

    if let Some(rate) = cli.refresh_rate {
        config.general.refresh_rate_ms = rate;
    }
    if let Some(interval) = cli.sample_interval {
        config.general.sample_interval_ms = interval;
    }
    if let Some(ref mode) = cli.mode {
        config.general.mode = mode.clone();
    }
    if let Some(ref sort) = cli.sort {
        config.general.default_sort = sort.clone();
    }
    if let Some(ref order) = cli.order {
        config.general.default_order = order.clone();
    }

    config
}
