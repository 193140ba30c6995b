//! Registered-site store
//!
//! Maps a site domain to its adapter and per-site crawl settings. The store
//! is a small keyed JSON file; registration is idempotent and a specific
//! adapter assignment is never downgraded back to the generic probe.

use crate::adapters::{domain_of, probe_site, AdapterKind, SiteAdapter, GENERIC_PROBE};
use crate::config::CrawlConfig;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A registered site and its crawl settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    /// Domain, without a leading `www.` for registration purposes
    pub id: String,
    /// Adapter assigned at registration; never downgraded once specific
    pub adapter_id: String,
    pub base_url: String,
    #[serde(default)]
    pub known_categories: BTreeSet<String>,
    pub politeness_delay_ms: u64,
    pub max_retries: u32,
}

impl Site {
    /// Resolve this site's adapter kind
    pub fn adapter_kind(&self) -> Result<AdapterKind> {
        self.adapter_id.parse()
    }

    /// Instantiate this site's adapter
    pub fn adapter(&self, min_content_chars: usize) -> Result<Box<dyn SiteAdapter>> {
        Ok(self.adapter_kind()?.build(&self.base_url, min_content_chars))
    }
}

/// Domain-keyed site store persisted as JSON
pub struct SiteRegistry {
    store_path: PathBuf,
    sites: BTreeMap<String, Site>,
}

impl SiteRegistry {
    /// Open the registry, loading the store file when it exists
    pub fn open(store_path: &Path) -> Result<Self> {
        let sites = if store_path.exists() {
            let content = std::fs::read_to_string(store_path)?;
            serde_json::from_str(&content)?
        } else {
            BTreeMap::new()
        };
        debug!("Loaded {} registered site(s) from {:?}", sites.len(), store_path);
        Ok(Self {
            store_path: store_path.to_path_buf(),
            sites,
        })
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.store_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.sites)?;
        std::fs::write(&self.store_path, content)?;
        Ok(())
    }

    /// Register a site by URL.
    ///
    /// A statically known domain gets its dedicated adapter. Anything else
    /// is probed: `homepage_body` (when supplied) is inspected for a
    /// repeating index structure, and the site registers as `generic-probe`
    /// only if the probe judges it crawlable. Re-registration updates
    /// settings (last write wins) but keeps a specific adapter assignment.
    pub fn register(
        &mut self,
        url: &str,
        homepage_body: Option<&str>,
        crawl: &CrawlConfig,
    ) -> Result<Site> {
        let domain = domain_of(url)?;

        let known = AdapterKind::for_domain(&domain);
        let mut categories = BTreeSet::new();

        let adapter_id = match (known, self.sites.get(&domain)) {
            (Some(kind), _) => kind.to_string(),
            // Never downgrade an already-specific adapter
            (None, Some(existing)) if existing.adapter_id != GENERIC_PROBE => {
                existing.adapter_id.clone()
            }
            (None, _) => {
                let body = homepage_body.ok_or_else(|| {
                    Error::NotCrawlable(format!(
                        "{}: no known adapter and no homepage body to probe",
                        domain
                    ))
                })?;
                let probe = probe_site(body)?;
                if !probe.crawlable {
                    return Err(Error::NotCrawlable(format!(
                        "{}: structural probe found only {} list links",
                        domain, probe.list_links
                    )));
                }
                info!(
                    "Probe registered {} as {} ({} list links, {} categories)",
                    domain,
                    GENERIC_PROBE,
                    probe.list_links,
                    probe.categories.len()
                );
                categories.extend(probe.categories);
                GENERIC_PROBE.to_string()
            }
        };

        if let Some(existing) = self.sites.get(&domain) {
            categories.extend(existing.known_categories.iter().cloned());
        }

        let site = Site {
            id: domain.clone(),
            adapter_id,
            base_url: url.trim_end_matches('/').to_string(),
            known_categories: categories,
            politeness_delay_ms: crawl.politeness_delay_ms,
            max_retries: crawl.max_retries,
        };

        self.sites.insert(domain, site.clone());
        self.save()?;
        Ok(site)
    }

    /// Look up a registered site by id
    pub fn lookup(&self, id: &str) -> Result<&Site> {
        let key = id.trim_start_matches("www.");
        self.sites
            .get(key)
            .ok_or_else(|| Error::UnknownSite(id.to_string()))
    }

    /// All registered sites
    pub fn list(&self) -> Vec<&Site> {
        self.sites.values().collect()
    }

    /// Record newly discovered categories for a site
    pub fn add_categories<I>(&mut self, id: &str, categories: I) -> Result<()>
    where
        I: IntoIterator<Item = String>,
    {
        let site = self
            .sites
            .get_mut(id)
            .ok_or_else(|| Error::UnknownSite(id.to_string()))?;
        site.known_categories.extend(categories);
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn crawl_config() -> CrawlConfig {
        CrawlConfig::default()
    }

    fn index_body(links: usize) -> String {
        let items: String = (0..links)
            .map(|i| format!("<li><a href=\"/{:05}/\">书{}</a></li>", 10000 + i, i))
            .collect();
        format!("<html><body><ul>{}</ul></body></html>", items)
    }

    #[test]
    fn test_register_known_domain() {
        let tmp = TempDir::new().unwrap();
        let mut reg = SiteRegistry::open(&tmp.path().join("sites.json")).unwrap();

        let site = reg
            .register("https://m.shuhaige.net", None, &crawl_config())
            .unwrap();
        assert_eq!(site.id, "m.shuhaige.net");
        assert_eq!(site.adapter_id, "shuhaige");
    }

    #[test]
    fn test_register_unknown_domain_probes() {
        let tmp = TempDir::new().unwrap();
        let mut reg = SiteRegistry::open(&tmp.path().join("sites.json")).unwrap();

        let site = reg
            .register(
                "https://unknown-novels.example",
                Some(&index_body(12)),
                &crawl_config(),
            )
            .unwrap();
        assert_eq!(site.adapter_id, GENERIC_PROBE);
    }

    #[test]
    fn test_register_unknown_domain_not_crawlable() {
        let tmp = TempDir::new().unwrap();
        let mut reg = SiteRegistry::open(&tmp.path().join("sites.json")).unwrap();

        let err = reg
            .register(
                "https://unknown-novels.example",
                Some("<html><body><p>hi</p></body></html>"),
                &crawl_config(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::NotCrawlable(_)));
    }

    #[test]
    fn test_register_idempotent_and_persistent() {
        let tmp = TempDir::new().unwrap();
        let store = tmp.path().join("sites.json");

        {
            let mut reg = SiteRegistry::open(&store).unwrap();
            reg.register("https://ixdzs8.com", None, &crawl_config()).unwrap();
            // Second registration with different settings: last write wins
            let mut cfg = crawl_config();
            cfg.politeness_delay_ms = 3000;
            let site = reg.register("https://ixdzs8.com", None, &cfg).unwrap();
            assert_eq!(site.politeness_delay_ms, 3000);
        }

        let reg = SiteRegistry::open(&store).unwrap();
        let site = reg.lookup("ixdzs8.com").unwrap();
        assert_eq!(site.adapter_id, "ixdzs");
        assert_eq!(site.politeness_delay_ms, 3000);
    }

    #[test]
    fn test_lookup_unknown_site() {
        let tmp = TempDir::new().unwrap();
        let reg = SiteRegistry::open(&tmp.path().join("sites.json")).unwrap();
        assert!(matches!(
            reg.lookup("nowhere.example"),
            Err(Error::UnknownSite(_))
        ));
    }

    #[test]
    fn test_add_categories_accumulates() {
        let tmp = TempDir::new().unwrap();
        let mut reg = SiteRegistry::open(&tmp.path().join("sites.json")).unwrap();
        reg.register("https://m.shuhaige.net", None, &crawl_config()).unwrap();

        reg.add_categories("m.shuhaige.net", vec!["都市".to_string()]).unwrap();
        reg.add_categories("m.shuhaige.net", vec!["玄幻".to_string(), "都市".to_string()])
            .unwrap();

        let site = reg.lookup("m.shuhaige.net").unwrap();
        assert_eq!(site.known_categories.len(), 2);
    }
}
