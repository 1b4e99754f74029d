//! triaged - motion clip triage daemon
//!
//! This daemon:
//! 1. Loads configuration (TRIAGE_CONFIG file + environment)
//! 2. Polls the inbox directory for new recordings
//! 3. Scans each clip and files it (accepted dir + snapshots, or rejected)
//! 4. Stops between clips on Ctrl-C

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;

use clip_triage::{backend_from_settings, ingest, Triage, TriageConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "Triage motion-triggered camera recordings")]
struct Args {
    /// Process the inbox once and exit instead of polling.
    #[arg(long)]
    once: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if !ingest::decodes_files() {
        bail!("triaged cannot decode recordings; rebuild with --features ingest-file-ffmpeg");
    }
    let cfg = TriageConfig::load()?;
    let mut detector = backend_from_settings(&cfg.detector)?;
    detector.warm_up().context("detector warm-up")?;

    let mut triage = Triage::from_config(&cfg, detector);
    triage.layout().ensure_dirs()?;

    log::info!(
        "triaged running. inbox={} accepted={} detector={} ({})",
        cfg.inbox_dir.display(),
        cfg.accepted_dir.display(),
        cfg.detector.backend,
        cfg.detector.url
    );
    log::info!(
        "labels=[{}] frame_skip={} min_confidence={:.2} roi={}",
        cfg.labels.iter().collect::<Vec<_>>().join(", "),
        cfg.scan.frame_skip,
        cfg.scan.min_confidence,
        cfg.roi.is_some()
    );

    if args.once {
        triage.process_inbox()?;
        return Ok(());
    }

    let stop = Arc::new(AtomicBool::new(false));
    let (tx, rx) = mpsc::channel();
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || {
            stop.store(true, Ordering::SeqCst);
            let _ = tx.send(());
        })
        .context("error setting Ctrl-C handler")?;
    }

    while !stop.load(Ordering::SeqCst) {
        if let Err(e) = triage.process_inbox_until(|| stop.load(Ordering::SeqCst)) {
            log::error!("inbox pass failed: {}", e);
        }
        // Sleeps until the next poll, or returns early on Ctrl-C.
        if rx.recv_timeout(cfg.poll_interval).is_ok() {
            break;
        }
    }

    log::info!("shutdown signal received, triaged stopped");
    Ok(())
}
