use anyhow::Result;
use makerspace_core::heartbeat::{self, HeartbeatConfig};
use makerspace_core::{Actor, SharedStore};
use owo_colors::OwoColorize;

pub async fn run(store: SharedStore, actor: &Actor, config: HeartbeatConfig) -> Result<()> {
    let handle = heartbeat::start(store, actor, config);

    println!(
        "{} {}",
        format!("  Online as {}", actor.username).green(),
        format!(
            "(heartbeat every {}, Ctrl-C to stop)",
            humantime::format_duration(config.interval)
        )
        .dimmed()
    );

    tokio::signal::ctrl_c().await?;
    handle.stop().await;
    println!("\n  {}", "Offline".dimmed());
    Ok(())
}
