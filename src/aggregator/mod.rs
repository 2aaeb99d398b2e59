//! Cross-site aggregation: concurrent fan-out, filter, price sort, truncate

use std::sync::Arc;

use anyhow::Result;
use tokio::task::JoinSet;
use tracing::warn;

use crate::models::ProductRecord;
use crate::scrapers::{AjioScraper, MyntraScraper};
use crate::traits::SiteScraper;

/// How many records each site adapter is asked for per aggregation run.
pub const PER_SITE_LIMIT: usize = 20;

/// Fans a search query out to every registered site adapter and merges the
/// results into one filtered, price-sorted list.
///
/// A failing adapter degrades to zero results for that site; it never fails
/// the aggregate run.
pub struct Aggregator {
    scrapers: Vec<Arc<dyn SiteScraper>>,
}

impl Aggregator {
    /// Create an aggregator over the default site adapters (Myntra, Ajio).
    pub fn new() -> Result<Self> {
        Ok(Self::with_scrapers(vec![
            Arc::new(MyntraScraper::new()?) as Arc<dyn SiteScraper>,
            Arc::new(AjioScraper::new()?) as Arc<dyn SiteScraper>,
        ]))
    }

    /// Create an aggregator over an explicit adapter set.
    pub fn with_scrapers(scrapers: Vec<Arc<dyn SiteScraper>>) -> Self {
        Self { scrapers }
    }

    /// Scrape every site concurrently and return up to `limit` records with
    /// both a parsed price and an image, sorted ascending by price.
    pub async fn search(&self, query: &str, limit: usize) -> Vec<ProductRecord> {
        let mut tasks = JoinSet::new();

        for scraper in &self.scrapers {
            let scraper = Arc::clone(scraper);
            let query = query.to_string();

            tasks.spawn(async move {
                let site = scraper.config().name.clone();
                match scraper.scrape(&query, limit).await {
                    Ok(products) => products,
                    Err(e) => {
                        warn!("Scraping {} failed for '{}': {}", site, query, e);
                        Vec::new()
                    }
                }
            });
        }

        let mut merged = Vec::new();
        while let Some(result) = tasks.join_next().await {
            match result {
                Ok(products) => merged.extend(products),
                Err(e) => warn!("Scrape task panicked: {}", e),
            }
        }

        filter_and_sort(merged, limit)
    }

    /// Scrape a single site by its display name, bypassing filter and sort.
    pub async fn search_site(
        &self,
        site: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ProductRecord>> {
        let scraper = self
            .scrapers
            .iter()
            .find(|s| s.config().name.eq_ignore_ascii_case(site))
            .ok_or_else(|| anyhow::anyhow!("No scraper registered for site {site:?}"))?;

        scraper.scrape(query, limit).await
    }
}

impl Clone for Aggregator {
    fn clone(&self) -> Self {
        Self {
            scrapers: self.scrapers.clone(),
        }
    }
}

/// Drop records without a price or image, sort ascending by price in minor
/// units, keep the cheapest `limit`.
fn filter_and_sort(records: Vec<ProductRecord>, limit: usize) -> Vec<ProductRecord> {
    let mut products: Vec<ProductRecord> = records
        .into_iter()
        .filter(|p| p.price.is_some() && !p.image.is_empty())
        .collect();

    products.sort_by_key(|p| p.price.as_ref().map_or(i64::MAX, |price| price.minor));
    products.truncate(limit);
    products
}
