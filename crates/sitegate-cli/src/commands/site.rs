use chrono::Utc;
use sitegate_core::storage::{CATALOG_KEY, ENABLED_KEY};
use sitegate_core::{
    find_site, format_remaining, AllowanceStore, BlockParams, Config, Controller, Event, SiteRef,
    UrlParts,
};

use super::{open_store, CliResult};

pub fn status(config: &Config, json: bool) -> CliResult {
    let mut store = open_store(config)?;
    store.install()?;
    let state = store.load()?;

    if json {
        let doc = serde_json::json!({
            ENABLED_KEY: state.enabled,
            CATALOG_KEY: state.catalog,
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    println!(
        "Enforcement: {}",
        if state.enabled { "enabled" } else { "disabled" }
    );
    for (category, entries) in state.catalog.categories() {
        println!();
        println!("{category}");
        for (index, entry) in entries.iter().enumerate() {
            println!(
                "  {index:>2}  {:<18} {:<20} {:>6}  [{}]",
                entry.display_name,
                entry.identifier,
                format_remaining(entry.time_remaining),
                entry.action_label()
            );
        }
    }
    Ok(())
}

pub fn set_enabled(config: &Config, enabled: bool) -> CliResult {
    let store = open_store(config)?;
    let mut controller = Controller::new(store, &config.block_page.url, Utc::now())?;
    controller.set_enabled(enabled, Utc::now())?;
    println!(
        "enforcement {}",
        if enabled { "enabled" } else { "disabled" }
    );
    Ok(())
}

pub fn grant(config: &Config, category: String, index: usize) -> CliResult {
    let store = open_store(config)?;
    let mut controller = Controller::new(store, &config.block_page.url, Utc::now())?;
    if let Event::AllowanceGranted { site, secs, .. } =
        controller.grant(&SiteRef::new(category, index), Utc::now())?
    {
        println!("granted {} to {site}", format_remaining(secs));
    }
    Ok(())
}

pub fn check(config: &Config, url: &str) -> CliResult {
    let mut store = open_store(config)?;
    store.install()?;
    let state = store.load()?;
    let parts = UrlParts::parse(url);

    match find_site(&state.catalog, &parts) {
        None => println!("untracked"),
        Some(hit) if !state.enabled => {
            println!("allowed: {} (enforcement disabled)", hit.entry.identifier);
        }
        Some(hit) if hit.entry.time_remaining == 0 => {
            let target = BlockParams::new(&parts.host, &hit.site).to_url(&config.block_page.url);
            println!("blocked: {target}");
        }
        Some(hit) => println!(
            "allowed: {} ({} left)",
            hit.entry.identifier,
            format_remaining(hit.entry.time_remaining)
        ),
    }
    Ok(())
}

pub fn reset(config: &Config) -> CliResult {
    let mut store = open_store(config)?;
    store.reset()?;
    println!("allowances reset to defaults");
    Ok(())
}
