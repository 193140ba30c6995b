//! Register command implementation

use crate::adapters::{domain_of, AdapterKind};
use crate::config::Config;
use crate::crawl::{Fetcher, GlobalLimiter};
use crate::error::Result;
use crate::registry::{Site, SiteRegistry};
use std::sync::Arc;
use tracing::info;

/// Register a site by URL.
///
/// Unknown domains need their homepage fetched so the structural probe
/// can judge crawlability; statically known domains register without any
/// network traffic.
pub async fn cmd_register(config: &Config, url: &str) -> Result<Site> {
    let mut registry = SiteRegistry::open(&config.paths.registry_file)?;

    let domain = domain_of(url)?;
    let homepage = if AdapterKind::for_domain(&domain).is_some() {
        None
    } else {
        info!("No dedicated adapter for {}, probing homepage", domain);
        let mut fetcher = Fetcher::new(
            &config.crawl,
            config.crawl.politeness_delay_ms,
            config.crawl.max_retries,
            Arc::new(GlobalLimiter::new(config.crawl.global_requests_per_second)),
        )?;
        Some(fetcher.fetch(url).await?)
    };

    registry.register(url, homepage.as_deref(), &config.crawl)
}

/// Human-readable site line
pub fn print_site(site: &Site) {
    println!("✓ Registered {}", site.id);
    println!("  Adapter: {}", site.adapter_id);
    println!("  Base URL: {}", site.base_url);
    if !site.known_categories.is_empty() {
        let cats: Vec<&str> = site.known_categories.iter().map(|s| s.as_str()).collect();
        println!("  Categories: {}", cats.join(", "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_register_known_domain_offline() {
        let tmp = TempDir::new().unwrap();
        let config = Config::load_from(Some(tmp.path().to_path_buf())).unwrap();

        // Known domains never hit the network
        let site = cmd_register(&config, "https://m.shuhaige.net").await.unwrap();
        assert_eq!(site.adapter_id, "shuhaige");
    }

    #[tokio::test]
    async fn test_register_unknown_domain_probes_homepage() {
        let server = wiremock::MockServer::start().await;
        let items: String = (0..12)
            .map(|i| format!("<li><a href=\"/{:05}/\">书{}</a></li>", 10000 + i, i))
            .collect();
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_string(format!("<html><body><ul>{}</ul></body></html>", items)),
            )
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let mut config = Config::load_from(Some(tmp.path().to_path_buf())).unwrap();
        config.crawl.politeness_delay_ms = 1;

        let site = cmd_register(&config, &server.uri()).await.unwrap();
        assert_eq!(site.adapter_id, "generic-probe");
    }
}
