//! Sites listing command implementation

use crate::config::Config;
use crate::error::Result;
use crate::registry::{Site, SiteRegistry};

/// List all registered sites
pub fn cmd_list_sites(config: &Config) -> Result<Vec<Site>> {
    let registry = SiteRegistry::open(&config.paths.registry_file)?;
    Ok(registry.list().into_iter().cloned().collect())
}

/// Human-readable sites table
pub fn print_sites(sites: &[Site]) {
    if sites.is_empty() {
        println!("No registered sites. Use 'bookforge register <url>' first.");
        return;
    }

    println!("Registered sites ({}):", sites.len());
    for site in sites {
        println!("\n  {}", site.id);
        println!("    Adapter: {}", site.adapter_id);
        println!("    Base URL: {}", site.base_url);
        println!("    Politeness delay: {}ms", site.politeness_delay_ms);
        if !site.known_categories.is_empty() {
            let cats: Vec<&str> = site.known_categories.iter().map(|s| s.as_str()).collect();
            println!("    Categories: {}", cats.join(", "));
        }
    }
}
