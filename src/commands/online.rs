use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use makerspace_core::watcher::{self, WatchMode, WatcherConfig};
use makerspace_core::{PresenceGateway, PresenceRecord, SharedStore};
use owo_colors::OwoColorize;

use crate::render::{pluralize, render_presence};
use crate::utils::tui::create_spinner;

pub async fn run(store: SharedStore, threshold: Duration, json: bool) -> Result<()> {
    let spinner = create_spinner("Checking presence");
    let online = PresenceGateway::new(store).online(Utc::now(), threshold).await;
    spinner.finish_and_clear();
    let online = online.unwrap_or_else(|e| {
        eprintln!("{}", format!("Could not read presence: {}", e).yellow());
        Vec::new()
    });

    if json {
        println!("{}", serde_json::to_string_pretty(&online)?);
    } else {
        print_online(&online, threshold);
    }
    Ok(())
}

/// Keep printing the online set as it changes until Ctrl-C.
pub async fn watch(store: SharedStore, config: WatcherConfig) -> Result<()> {
    let handle = watcher::start(store, config).await;
    let mut updates = handle.subscribe();

    if handle.mode() == WatchMode::Poll {
        println!(
            "{}",
            format!(
                "  No live feed from the store, refreshing every {}",
                humantime::format_duration(config.refresh_interval)
            )
            .dimmed()
        );
    }
    print_online(&handle.current(), config.threshold);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let online = updates.borrow_and_update().clone();
                println!("\n{}", Utc::now().format("%H:%M:%S").to_string().dimmed());
                print_online(&online, config.threshold);
            }
        }
    }

    handle.stop().await;
    Ok(())
}

fn print_online(online: &[PresenceRecord], threshold: Duration) {
    if online.is_empty() {
        println!(
            "{}",
            format!("Nobody seen in the last {}", humantime::format_duration(threshold)).dimmed()
        );
        return;
    }

    let now = Utc::now();
    println!(
        "{}",
        format!("{} {} online", online.len(), pluralize("member", online.len())).bold()
    );
    for record in online {
        println!("{}", render_presence(record, now));
    }
}
