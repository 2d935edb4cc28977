use anyhow::Result;
use makerspace_core::config::{PortalConfig, StoreBackend};
use owo_colors::OwoColorize;

pub fn run(config: &PortalConfig) -> Result<()> {
    let config_path = PortalConfig::config_path()?;

    println!("{}", "Paths".bold());
    println!("  Config:     {}", config_path.display());

    println!("\n{}", "Store".bold());
    match config.store.backend {
        StoreBackend::Memory => println!("  Backend:    memory"),
        StoreBackend::Rest => {
            println!("  Backend:    rest");
            println!(
                "  URL:        {}",
                config.store.url.as_deref().unwrap_or("(not set)")
            );
            let key = if config.store.api_key.is_some() { "set" } else { "not set" };
            println!("  API key:    {}", key);
        }
    }
    println!("  Timeout:    {}", humantime::format_duration(config.store.timeout));

    println!("\n{}", "Session".bold());
    match &config.session {
        Some(actor) => println!("  {} ({}, {})", actor.username, actor.user_id, actor.role),
        None => println!("  {}", "Not configured".dimmed()),
    }

    let presence = &config.presence;
    println!("\n{}", "Presence".bold());
    println!("  Heartbeat:  every {}", humantime::format_duration(presence.heartbeat_interval));
    match presence.liveness_threshold {
        Some(t) => println!("  Online if:  seen within {}", humantime::format_duration(t)),
        None => println!("  Online if:  {}", "no threshold set (pass --threshold)".dimmed()),
    }
    println!("  Refresh:    every {}", humantime::format_duration(presence.refresh_interval));

    let horizon = &config.recurrence;
    println!("\n{}", "Recurrence".bold());
    println!(
        "  Daily {} days, weekly {} weeks, monthly {} months",
        horizon.daily_days, horizon.weekly_weeks, horizon.monthly_months
    );

    Ok(())
}
