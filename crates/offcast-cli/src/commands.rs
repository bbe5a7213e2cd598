//! CLI command implementations
//!
//! Every command seeds the simulated engine the same way, so the output
//! is deterministic: one download mid-transfer, one paused partway, one
//! still queued.

use anyhow::Result;
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use offcast_core::{
    helpers, DownloadCoordinator, DownloadRecord, SdkClient, SimulatedSdk, VideoId,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

use crate::output;

/// Demo catalog, sized so a watch session finishes in a few seconds
const CATALOG: &[(&str, &str, u64)] = &[
    ("BEArYFdaFbt", "Big Buck Bunny", 158 * 1024 * 1024),
    ("9dXaTQykGfw", "Sintel", 112 * 1024 * 1024),
    ("K3pV7cNwRda", "Tears of Steel", 96 * 1024 * 1024),
];

async fn seed_engine() -> Result<Arc<SimulatedSdk>> {
    let engine = Arc::new(SimulatedSdk::new());
    for (id, title, bytes) in CATALOG {
        let thumbnail = Url::parse(&format!("https://cdn.offcast.app/thumbs/{id}.jpg"))?;
        engine.register(
            DownloadRecord::new(*id)
                .with_title(*title)
                .with_thumbnail(thumbnail)
                .with_total_bytes(*bytes),
        );
    }

    let first = VideoId::new(CATALOG[0].0);
    let second = VideoId::new(CATALOG[1].0);
    engine.begin(&first)?;
    engine.begin(&second)?;
    for _ in 0..4 {
        engine.tick();
    }
    engine.pause(&second).await?;

    Ok(engine)
}

/// Show the downloads list once
pub async fn list(format: &str) -> Result<()> {
    let engine = seed_engine().await?;
    let coordinator = DownloadCoordinator::with_defaults(engine.clone());
    coordinator.start().await;

    output::print_records(&coordinator.snapshot().await, format)?;

    coordinator.stop().await;
    Ok(())
}

/// Watch download progress live until nothing is active (or a deadline)
pub async fn watch(interval: u64, duration: u64) -> Result<()> {
    let engine = seed_engine().await?;
    let ticker = engine.clone().spawn_ticker(Duration::from_millis(interval.max(10)));
    let coordinator = DownloadCoordinator::with_defaults(engine.clone());
    coordinator.start().await;
    let mut changes = coordinator.subscribe_changes();

    let progress = MultiProgress::new();
    let bar_style = ProgressStyle::with_template("{prefix:24} [{bar:32}] {percent:>3}% {msg}")?
        .progress_chars("=> ");

    let mut bars: HashMap<String, ProgressBar> = HashMap::new();
    let started = Instant::now();

    loop {
        let snapshot = coordinator.snapshot().await;
        for record in &snapshot {
            let bar = bars.entry(record.video_id.to_string()).or_insert_with(|| {
                let bar = progress.add(ProgressBar::new(100));
                bar.set_style(bar_style.clone());
                bar.set_prefix(record.display_title().to_string());
                bar
            });
            bar.set_position(record.progress() as u64);
            bar.set_message(record.state.to_string());
        }

        if duration > 0 && started.elapsed() >= Duration::from_secs(duration) {
            break;
        }
        if duration == 0 && snapshot.iter().all(|r| !r.state.is_active()) {
            break;
        }

        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::time::sleep(Duration::from_millis(250)) => {}
        }
    }

    for bar in bars.values() {
        bar.finish();
    }
    debug!("watch loop done");
    ticker.abort();
    coordinator.stop().await;
    Ok(())
}

/// Pause an active download
pub async fn pause(video_id: &str, format: &str) -> Result<()> {
    let engine = seed_engine().await?;
    let coordinator = DownloadCoordinator::with_defaults(engine.clone());
    coordinator.start().await;

    let id = VideoId::new(video_id);
    let failed = match coordinator.pause(&id).await {
        Ok(()) => {
            println!("{} paused {}", style("ok:").green().bold(), id);
            false
        }
        Err(e) => {
            eprintln!("{} {} [{}]", style("error:").red().bold(), e, e.error_code());
            true
        }
    };

    output::print_records(&coordinator.snapshot().await, format)?;
    coordinator.stop().await;
    if failed {
        std::process::exit(1);
    }
    Ok(())
}

/// Resume a download; whatever was active gets displaced
pub async fn resume(video_id: &str, format: &str) -> Result<()> {
    let engine = seed_engine().await?;
    let coordinator = DownloadCoordinator::with_defaults(engine.clone());
    coordinator.start().await;

    let id = VideoId::new(video_id);
    let displaced: Vec<VideoId> = coordinator
        .snapshot()
        .await
        .iter()
        .filter(|r| r.state.is_active() && r.video_id != id)
        .map(|r| r.video_id.clone())
        .collect();

    let failed = match coordinator.resume(&id).await {
        Ok(()) => {
            println!("{} resumed {}", style("ok:").green().bold(), id);
            for other in &displaced {
                println!("    displaced {other} (paused)");
            }
            false
        }
        Err(e) => {
            eprintln!("{} {} [{}]", style("error:").red().bold(), e, e.error_code());
            true
        }
    };

    output::print_records(&coordinator.snapshot().await, format)?;
    coordinator.stop().await;
    if failed {
        std::process::exit(1);
    }
    Ok(())
}

/// Remove a download from the device
pub async fn remove(video_id: &str, format: &str) -> Result<()> {
    let engine = seed_engine().await?;
    let coordinator = DownloadCoordinator::with_defaults(engine.clone());
    coordinator.start().await;

    let id = VideoId::new(video_id);
    let failed = match coordinator.remove(&id).await {
        Ok(()) => {
            println!("{} removed {}", style("ok:").green().bold(), id);
            false
        }
        Err(e) => {
            eprintln!("{} {} [{}]", style("error:").red().bold(), e, e.error_code());
            true
        }
    };

    output::print_records(&coordinator.snapshot().await, format)?;
    coordinator.stop().await;
    if failed {
        std::process::exit(1);
    }
    Ok(())
}

/// Point status query straight through the boundary helpers
pub async fn status(video_id: &str, format: &str) -> Result<()> {
    let engine = seed_engine().await?;
    let id = VideoId::new(video_id);

    match helpers::download_info(engine.as_ref(), &id).await {
        Ok(info) => output::print_info(&info, format)?,
        Err(e) => {
            eprintln!("{} {} [{}]", style("error:").red().bold(), e, e.error_code());
            std::process::exit(1);
        }
    }
    Ok(())
}

/// Scripted walkthrough of the single-active-download policy
pub async fn demo() -> Result<()> {
    println!("{}", style("Offcast download coordination demo").bold());
    println!();

    let engine = seed_engine().await?;
    let coordinator = DownloadCoordinator::with_defaults(engine.clone());
    coordinator.start().await;

    let first = VideoId::new(CATALOG[0].0);
    let second = VideoId::new(CATALOG[1].0);
    let third = VideoId::new(CATALOG[2].0);

    println!("{}", style("Seeded downloads:").underlined());
    output::print_records(&coordinator.snapshot().await, "text")?;

    println!();
    println!("resume {second} while {first} is downloading:");
    coordinator.resume(&second).await?;
    settle().await;
    output::print_records(&coordinator.snapshot().await, "text")?;
    report_active(&coordinator).await;

    println!();
    println!("resume {third} (still queued) displaces {second}:");
    coordinator.resume(&third).await?;
    settle().await;
    output::print_records(&coordinator.snapshot().await, "text")?;
    report_active(&coordinator).await;

    println!();
    println!("running the engine until {third} completes...");
    for _ in 0..24 {
        engine.tick();
    }
    settle().await;
    let info = helpers::download_info(engine.as_ref(), &third).await?;
    println!("{third} downloaded: {}", info.is_downloaded);

    println!();
    coordinator.remove(&third).await?;
    settle().await;
    println!("{}", style("After removal:").underlined());
    output::print_records(&coordinator.snapshot().await, "text")?;

    coordinator.stop().await;
    Ok(())
}

async fn report_active(coordinator: &DownloadCoordinator) {
    let active = coordinator
        .snapshot()
        .await
        .iter()
        .filter(|r| r.state.is_active())
        .count();
    println!("active downloads: {active}");
}

/// Give the event pump a beat to apply pushed batches
async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
