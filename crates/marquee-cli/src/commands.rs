//! CLI command implementations

use crate::output::{print_rows, OutputFormat};
use chrono::{DateTime, Utc};
use marquee_core::catalog::load_streams;
use marquee_core::{
    Catalog, Effect, JsonFileStore, LogRenewer, MarqueeConfig, OfflineLibrary, PlaybackEvent, PlayerStatus,
    PresentationMachine, RenewalScheduler, RenewalStore, SystemClock,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tabled::Tabled;
use tracing::{info, warn};
use url::Url;

// =============================================================================
// Replay
// =============================================================================

/// One replayed timeline entry
#[derive(Debug, Serialize, Tabled)]
pub struct ReplayStep {
    #[tabled(rename = "#")]
    pub index: usize,
    pub event: String,
    pub from: String,
    pub to: String,
    pub effect: String,
}

fn describe_effect(effect: Option<Effect>) -> String {
    match effect {
        None => "-".to_string(),
        Some(Effect::Restart) => "restart".to_string(),
        Some(Effect::ShowCurrentTime { time }) => format!("show time {:.1}s", time),
        Some(Effect::ShowDuration { duration }) => format!("show duration {:.1}s", duration),
    }
}

/// Parse a timeline: each entry is an event plus the player status
/// (`paused`, `ad_playing`, `seeking`) observed with it
pub fn parse_timeline(text: &str) -> anyhow::Result<Vec<(PlaybackEvent, PlayerStatus)>> {
    let entries: Vec<serde_json::Value> = serde_json::from_str(text)?;
    entries
        .into_iter()
        .enumerate()
        .map(|(i, entry)| {
            let event = serde_json::from_value(entry.clone())
                .map_err(|e| anyhow::anyhow!("timeline entry {}: {}", i, e))?;
            let status = serde_json::from_value(entry)
                .map_err(|e| anyhow::anyhow!("timeline entry {}: {}", i, e))?;
            Ok((event, status))
        })
        .collect()
}

/// Run a timeline through a fresh presentation machine
pub fn replay_timeline(timeline: &[(PlaybackEvent, PlayerStatus)]) -> Vec<ReplayStep> {
    let mut machine = PresentationMachine::new();
    timeline
        .iter()
        .enumerate()
        .map(|(i, (event, status))| {
            let from = machine.state();
            let outcome = machine.apply(event, status);
            ReplayStep {
                index: i + 1,
                event: event.kind().to_string(),
                from: from.to_string(),
                to: outcome.state.to_string(),
                effect: describe_effect(outcome.effect),
            }
        })
        .collect()
}

/// Replay a recorded timeline
pub fn replay(path: &Path, format: &str) -> anyhow::Result<()> {
    let timeline = parse_timeline(&std::fs::read_to_string(path)?)?;
    let steps = replay_timeline(&timeline);

    print_rows(&steps, OutputFormat::from(format), |s| {
        format!("{:>3}. {:<24} {:>10} -> {:<10} {}", s.index, s.event, s.from, s.to, s.effect)
    })?;

    if let Some(last) = steps.last() {
        info!(events = steps.len(), state = %last.to, "Replay finished");
    }
    Ok(())
}

// =============================================================================
// Catalog
// =============================================================================

#[derive(Debug, Serialize, Tabled)]
pub struct CatalogRow {
    pub section: String,
    pub name: String,
    pub source: String,
}

/// List a catalog from a file or URL
pub async fn catalog(source: &str, format: &str) -> anyhow::Result<()> {
    let catalog = match Url::parse(source) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Catalog::fetch(&url).await?,
        _ => Catalog::load(source)?,
    };

    let rows: Vec<CatalogRow> = catalog
        .sections()
        .flat_map(|(section, items)| {
            items.iter().map(move |c| CatalogRow {
                section: section.to_string(),
                name: c.name.clone(),
                source: c.video_source.clone(),
            })
        })
        .collect();

    match OutputFormat::from(format) {
        OutputFormat::Text => {
            for (section, items) in catalog.sections() {
                println!("{} ({})", section, items.len());
                for item in items {
                    println!("  {} - {}", item.name, item.video_source);
                }
            }
        }
        other => print_rows(&rows, other, |_| String::new())?,
    }
    Ok(())
}

// =============================================================================
// Renewals
// =============================================================================

#[derive(Debug, Serialize, Tabled)]
pub struct RenewalRow {
    pub content: String,
    pub next_renewal_at: String,
    pub due: bool,
    pub remaining: String,
}

fn describe_remaining(next: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let remaining = next - now;
    if remaining <= chrono::Duration::zero() {
        return "overdue".to_string();
    }
    format!("{}h {:02}m", remaining.num_hours(), remaining.num_minutes() % 60)
}

pub fn renewal_rows(store: &dyn RenewalStore, now: DateTime<Utc>) -> Vec<RenewalRow> {
    store
        .records()
        .into_iter()
        .map(|r| RenewalRow {
            due: r.is_due(now),
            remaining: describe_remaining(r.next_renewal_at, now),
            next_renewal_at: r.next_renewal_at.to_rfc3339(),
            content: r.content_key,
        })
        .collect()
}

/// List persisted renewal records
pub fn renewals(path: &Path, format: &str) -> anyhow::Result<()> {
    let store = JsonFileStore::open(path)?;
    let rows = renewal_rows(&store, Utc::now());

    if rows.is_empty() && OutputFormat::from(format) == OutputFormat::Text {
        println!("No renewal records in {}", path.display());
        return Ok(());
    }

    print_rows(&rows, OutputFormat::from(format), |r| {
        format!(
            "{}  {}  {}",
            r.next_renewal_at,
            if r.due { "due" } else { r.remaining.as_str() },
            r.content
        )
    })
}

// =============================================================================
// Watch
// =============================================================================

/// Run renewal cycles for every DRM stream until Ctrl-C
pub async fn watch(
    store_path: &Path,
    streams_path: &Path,
    config: &MarqueeConfig,
    format: &str,
) -> anyhow::Result<()> {
    let streams = load_streams(streams_path)?;
    let store = Arc::new(JsonFileStore::open(store_path)?);
    let scheduler = RenewalScheduler::new(
        &config.renewal,
        store.clone(),
        Arc::new(LogRenewer),
        Arc::new(SystemClock),
    );
    let library = OfflineLibrary::new(streams, scheduler, &config.offline)?;

    let mut scheduled = 0;
    for item in library.items() {
        if item.drm().is_none() {
            continue;
        }
        match library.renew_now(item.content_key()) {
            Ok(_) => scheduled += 1,
            Err(e) => warn!(content = item.content_key(), error = %e, "Could not schedule renewal"),
        }
    }

    if scheduled == 0 {
        println!("No DRM streams in {}", streams_path.display());
        return Ok(());
    }

    print_rows(&renewal_rows(&*store, Utc::now()), OutputFormat::from(format), |r| {
        format!("{}  next renewal {}", r.content, r.next_renewal_at)
    })?;
    info!(streams = scheduled, "Watching license renewals, press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    library.suspend_renewals();
    info!("Renewal watch stopped");
    Ok(())
}
