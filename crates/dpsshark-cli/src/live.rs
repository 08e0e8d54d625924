use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::Context;
use dpsshark_core::clock::unix_millis;
use dpsshark_core::ingest::ingestion_queue;
use dpsshark_core::source::live::{LiveCapture, list_interfaces};
use dpsshark_core::{DiscardFrames, IdentityWriter, PlayerSummary, Session};

use crate::{CliError, EngineArgs};

#[derive(clap::Args, Debug)]
pub(crate) struct LiveArgs {
    /// Interface to capture on (system default when omitted)
    #[arg(short, long)]
    interface: Option<String>,

    /// Seconds between printed snapshots
    #[arg(long, default_value_t = 1)]
    interval: u64,

    #[command(flatten)]
    engine: EngineArgs,
}

pub(crate) fn cmd_interfaces() -> Result<(), CliError> {
    let interfaces = list_interfaces().map_err(|err| {
        CliError::new(
            format!("cannot list interfaces: {err}"),
            Some("live capture may need elevated privileges".to_string()),
        )
    })?;
    for interface in interfaces {
        match interface.description {
            Some(desc) => println!("{}\t{}", interface.name, desc),
            None => println!("{}", interface.name),
        }
    }
    Ok(())
}

pub(crate) fn cmd_live(args: LiveArgs) -> Result<(), CliError> {
    let mut setup = args.engine.build()?;
    if args.interface.is_some() {
        setup.config.capture.interface = args.interface;
    }

    let mut capture = LiveCapture::open(&setup.config.capture).map_err(|err| {
        CliError::new(
            format!("cannot open capture: {err}"),
            Some("run `dpsshark interfaces` and check capture permissions".to_string()),
        )
    })?;

    let identity_writer = match &setup.identity_cache {
        Some(path) => Some(
            IdentityWriter::spawn(path)
                .with_context(|| format!("Failed to start identity writer: {}", path.display()))?,
        ),
        None => None,
    };

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))
            .context("Failed to install Ctrl-C handler")?;
    }

    let (handle, rx) = ingestion_queue(setup.config.capture.queue_capacity);
    let capture_thread = {
        let running = Arc::clone(&running);
        let handle = handle.clone();
        thread::spawn(move || {
            if let Err(err) = capture.pump(&handle, &running) {
                tracing::error!(error = %err, "capture failed");
                running.store(false, Ordering::SeqCst);
            }
        })
    };
    let processing_thread = {
        let running = Arc::clone(&running);
        let mut session = Session::new(&setup.config, setup.engine.clone(), DiscardFrames::default());
        if let Some(writer) = identity_writer {
            session = session.with_identity_writer(writer);
        }
        thread::spawn(move || session.run(&rx, &running))
    };

    let interval = Duration::from_secs(args.interval.max(1));
    while running.load(Ordering::SeqCst) {
        thread::sleep(interval);
        print_snapshot(&setup.engine.all_users().into_values().collect::<Vec<_>>());
    }

    let _ = capture_thread.join();
    let _ = processing_thread.join();
    let stats = handle.stats();
    tracing::info!(
        accepted = stats.accepted,
        dropped_full = stats.dropped_full,
        "live capture finished"
    );
    setup.finish(unix_millis())
}

fn print_snapshot(players: &[PlayerSummary]) {
    if players.is_empty() {
        return;
    }
    println!("{:>12}  {:<16} {:>10} {:>14} {:>10}", "uid", "name", "dps", "damage", "hps");
    for player in players {
        println!(
            "{:>12}  {:<16} {:>10} {:>14} {:>10}",
            player.uid,
            player.name,
            player.realtime_dps,
            player.total_damage.total,
            player.realtime_hps
        );
    }
}
