//! SSAI simulator (ssai-sim) - Main entry point
//!
//! Replays a stitched VOD stream with a preroll, a midroll and a postroll
//! through the ad break coordinator and prints the outward event stream as
//! JSON lines.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use ssai_common::config::resolve_config_path;
use ssai_common::events::CuePoint;
use ssai_common::{AdInsertionConfig, PlayerEvent};
use ssai_player::sim::Playthrough;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for ssai-sim
#[derive(Parser, Debug)]
#[command(name = "ssai-sim")]
#[command(about = "Server-side ad insertion playback simulator")]
#[command(version)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "SSAI_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose logging (overrides the config file)
    #[arg(short, long)]
    debug: bool,

    /// Content time to start playback from
    #[arg(short = 't', long)]
    start_time: Option<f64>,

    /// Content duration in seconds
    #[arg(long, default_value = "300")]
    content_duration: f64,

    /// Length of each ad break in seconds
    #[arg(long, default_value = "15")]
    ad_duration: f64,

    /// Content time to seek to once playback has run for ten seconds
    #[arg(long)]
    seek: Option<f64>,

    /// Disable snapback (overrides the config file)
    #[arg(long)]
    no_snapback: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match resolve_config_path(args.config.as_deref(), "SSAI_CONFIG") {
        Some(path) => AdInsertionConfig::load(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => AdInsertionConfig::default(),
    };
    config.debug |= args.debug;
    if args.no_snapback {
        config.snapback = false;
    }
    config.validate().context("Invalid configuration")?;

    // Initialize tracing
    let default_filter = if config.debug {
        "ssai_player=debug,ssai_sim=debug"
    } else {
        "ssai_player=info,ssai_sim=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cue_points = stitched_layout(args.content_duration, args.ad_duration);
    info!(
        "Simulating {:.0}s of content with {} ad breaks",
        args.content_duration,
        cue_points.len()
    );

    let mut playthrough = Playthrough::new(config, cue_points, args.content_duration);
    let mut events = playthrough.coordinator().subscribe();

    playthrough
        .load(args.start_time)
        .await
        .context("Failed to load stream")?;
    playthrough.play().context("Failed to start playback")?;
    print_events(&mut events)?;

    let max_steps = ((args.content_duration + 3.0 * args.ad_duration) * 4.0) as usize + 16;
    let mut steps = 0;
    while !playthrough.finished() && steps < max_steps {
        if steps == 10 {
            if let Some(target) = args.seek {
                info!("Seeking to content {:.1}s", target);
                playthrough.seek(target).context("Seek failed")?;
            }
        }
        playthrough.step();
        print_events(&mut events)?;
        steps += 1;
    }

    if !playthrough.finished() {
        warn!("Stopped after {} steps without reaching the end", steps);
    }
    info!(
        "Playback finished in state {} after {} steps",
        playthrough.coordinator().state(),
        steps
    );

    playthrough.coordinator_mut().destroy();
    Ok(())
}

/// Preroll, midroll at half the content and postroll, in stream time
fn stitched_layout(content_duration: f64, ad_duration: f64) -> Vec<CuePoint> {
    let midroll_start = ad_duration + content_duration / 2.0;
    let postroll_start = content_duration + 2.0 * ad_duration;
    vec![
        CuePoint::new(0.0, ad_duration, false),
        CuePoint::new(midroll_start, midroll_start + ad_duration, false),
        CuePoint::new(postroll_start, postroll_start + ad_duration, false),
    ]
}

fn print_events(events: &mut broadcast::Receiver<PlayerEvent>) -> Result<()> {
    loop {
        match events.try_recv() {
            Ok(event) => {
                // Progress ticks would drown the interesting events
                if matches!(event, PlayerEvent::AdProgress { .. })
                    || event.media_kind() == Some(ssai_common::events::MediaEventKind::TimeUpdate)
                {
                    continue;
                }
                println!("{}", serde_json::to_string(&event)?);
            }
            Err(TryRecvError::Lagged(skipped)) => warn!("Dropped {} events", skipped),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return Ok(()),
        }
    }
}
