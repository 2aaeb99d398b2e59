//! Trend cache orchestration: staleness checks, single-flight refresh,
//! and the top-N trend view persisted per search query.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::aggregator::{Aggregator, PER_SITE_LIMIT};
use crate::database::TrendStore;
use crate::models::{ProductRecord, TrendEntry};

/// Hours after which a cached entry must be refreshed. The boundary is
/// inclusive: an entry exactly this old counts as stale.
pub const STALE_AFTER_HOURS: i64 = 24;

/// How many of the cheapest aggregated records a trend entry keeps.
pub const TREND_TOP_N: usize = 5;

const DEFAULT_DATABASE_URL: &str = "sqlite:database/trends.db";

/// Whether `entry` must be refreshed before it can be served as current.
///
/// An entry is stale when it doesn't exist, has no products, or was last
/// updated `STALE_AFTER_HOURS` or more before `now`.
pub(crate) fn is_stale(entry: Option<&TrendEntry>, now: DateTime<Utc>) -> bool {
    match entry {
        None => true,
        Some(entry) => {
            entry.products.is_empty()
                || now - entry.updated_at >= Duration::hours(STALE_AFTER_HOURS)
        }
    }
}

pub struct TrendFinder {
    store: TrendStore,
    aggregator: Aggregator,
    // One async mutex per search query so concurrent requests for the same
    // stale key await a single in-flight refresh instead of each scraping.
    refresh_locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl TrendFinder {
    pub async fn new() -> Result<Self> {
        let db_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());
        let store = TrendStore::new(&db_url).await?;
        let aggregator = Aggregator::new()?;

        Ok(Self::with_parts(store, aggregator))
    }

    pub fn with_parts(store: TrendStore, aggregator: Aggregator) -> Self {
        Self {
            store,
            aggregator,
            refresh_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn key_lock(&self, query: &str) -> Arc<Mutex<()>> {
        let mut locks = self.refresh_locks.lock().await;
        locks
            .entry(query.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Serve the cached entry for `query`, refreshing it first when stale.
    ///
    /// When a refresh finds nothing, the last-known-good entry is served
    /// instead; `None` means there is nothing usable to serve at all.
    pub async fn trends_for(&self, query: &str) -> Result<Option<TrendEntry>> {
        let entry = self.store.get(query).await?;
        if !is_stale(entry.as_ref(), Utc::now()) {
            return Ok(entry);
        }

        let lock = self.key_lock(query).await;
        let _guard = lock.lock().await;

        // Another request may have finished a refresh while we waited
        let entry = self.store.get(query).await?;
        if !is_stale(entry.as_ref(), Utc::now()) {
            return Ok(entry);
        }

        let refreshed = self.refresh(query).await?;
        if refreshed.is_some() {
            return Ok(refreshed);
        }

        // Scrape came back empty: keep serving last-known-good data
        Ok(entry.filter(|e| !e.products.is_empty()))
    }

    /// Re-scrape `query` regardless of cache state. Returns `None` and
    /// leaves the stored entry untouched when no site produced a usable
    /// record.
    pub async fn force_refresh(&self, query: &str) -> Result<Option<TrendEntry>> {
        let lock = self.key_lock(query).await;
        let _guard = lock.lock().await;

        self.refresh(query).await
    }

    async fn refresh(&self, query: &str) -> Result<Option<TrendEntry>> {
        let mut products = self.aggregator.search(query, PER_SITE_LIMIT).await;
        products.truncate(TREND_TOP_N);

        if products.is_empty() {
            warn!("No products found for '{}', leaving cache untouched", query);
            return Ok(None);
        }

        let entry = self.store.upsert(query, &products).await?;
        info!(
            "Cached {} products for '{}'",
            entry.products.len(),
            entry.search_query
        );
        Ok(Some(entry))
    }

    /// Scrape one site directly, bypassing the cache and the aggregation
    /// filter.
    pub async fn scrape_site(
        &self,
        site: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ProductRecord>> {
        self.aggregator.search_site(site, query, limit).await
    }

    /// Walk every cached query and refresh the stale ones. Used by the
    /// background scheduler.
    pub async fn refresh_stale(&self) -> Result<()> {
        let queries = self.store.all_queries().await?;
        info!("Checking {} cached queries for staleness", queries.len());

        for query in queries {
            if let Err(e) = self.trends_for(&query).await {
                error!("Failed to refresh '{}': {}", query, e);
            }
        }

        Ok(())
    }
}

impl Clone for TrendFinder {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            aggregator: self.aggregator.clone(),
            refresh_locks: self.refresh_locks.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::anyhow;
    use async_trait::async_trait;

    use crate::models::Price;
    use crate::traits::{ScraperConfig, SiteScraper, SiteSelectors};

    fn stub_config(name: &str) -> ScraperConfig {
        ScraperConfig {
            name: name.to_string(),
            base_url: format!("https://{}.example", name.to_lowercase()),
            search_url_pattern: format!("https://{}.example/s?q={{query}}", name.to_lowercase()),
            selectors: SiteSelectors {
                product_container: ".item".to_string(),
                name: ".name".to_string(),
                brand: None,
                price: ".price".to_string(),
                original_price: None,
                discounted_price: None,
                link: "a".to_string(),
                image: "img".to_string(),
            },
        }
    }

    fn record(name: &str, rupees: i64) -> ProductRecord {
        ProductRecord {
            name: name.to_string(),
            original_price: None,
            discounted_price: None,
            price: Some(Price {
                minor: rupees * 100,
                currency: "INR".to_string(),
            }),
            image: format!("https://img.example/{name}.jpg"),
            link: format!("https://shop.example/{name}"),
            source: "Myntra".to_string(),
        }
    }

    fn entry(products: Vec<ProductRecord>, updated_at: DateTime<Utc>) -> TrendEntry {
        TrendEntry {
            search_query: "jeans".to_string(),
            products,
            created_at: updated_at,
            updated_at,
        }
    }

    struct CountingScraper {
        config: ScraperConfig,
        products: Vec<ProductRecord>,
        calls: Arc<AtomicUsize>,
    }

    impl CountingScraper {
        fn new(products: Vec<ProductRecord>) -> (Arc<dyn SiteScraper>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let scraper: Arc<dyn SiteScraper> = Arc::new(Self {
                config: stub_config("Myntra"),
                products,
                calls: calls.clone(),
            });
            (scraper, calls)
        }
    }

    #[async_trait]
    impl SiteScraper for CountingScraper {
        fn config(&self) -> &ScraperConfig {
            &self.config
        }

        async fn scrape(&self, _query: &str, limit: usize) -> Result<Vec<ProductRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            // Yield so overlapping requests can reach the key lock
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            Ok(self.products.iter().take(limit).cloned().collect())
        }
    }

    struct FailingScraper {
        config: ScraperConfig,
    }

    #[async_trait]
    impl SiteScraper for FailingScraper {
        fn config(&self) -> &ScraperConfig {
            &self.config
        }

        async fn scrape(&self, _query: &str, _limit: usize) -> Result<Vec<ProductRecord>> {
            Err(anyhow!("navigation timeout"))
        }
    }

    async fn finder_with(scraper: Arc<dyn SiteScraper>) -> TrendFinder {
        let store = TrendStore::in_memory().await.unwrap();
        TrendFinder::with_parts(store, Aggregator::with_scrapers(vec![scraper]))
    }

    #[test]
    fn missing_and_empty_entries_are_stale() {
        let now = Utc::now();
        assert!(is_stale(None, now));
        assert!(is_stale(Some(&entry(vec![], now)), now));
    }

    #[test]
    fn staleness_boundary_is_inclusive() {
        let now = Utc::now();

        let fresh = entry(vec![record("jeans", 999)], now - Duration::minutes(23 * 60 + 59));
        assert!(!is_stale(Some(&fresh), now));

        let at_threshold = entry(vec![record("jeans", 999)], now - Duration::hours(24));
        assert!(is_stale(Some(&at_threshold), now));

        let past_threshold = entry(
            vec![record("jeans", 999)],
            now - Duration::minutes(24 * 60 + 1),
        );
        assert!(is_stale(Some(&past_threshold), now));
    }

    #[tokio::test]
    async fn empty_cache_scrape_persists_an_entry() {
        let (scraper, calls) =
            CountingScraper::new(vec![record("jeans", 999), record("kurta", 1299)]);
        let finder = finder_with(scraper).await;

        let entry = finder
            .trends_for("light blue wide leg jeans")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(entry.search_query, "light blue wide leg jeans");
        assert_eq!(entry.products.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let persisted = finder
            .store
            .get("light blue wide leg jeans")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(persisted.products.len(), entry.products.len());
    }

    #[tokio::test]
    async fn reads_within_the_staleness_window_are_idempotent() {
        let (scraper, calls) = CountingScraper::new(vec![record("jeans", 999)]);
        let finder = finder_with(scraper).await;

        let first = finder.trends_for("jeans").await.unwrap().unwrap();
        let second = finder.trends_for("jeans").await.unwrap().unwrap();

        assert_eq!(
            serde_json::to_string(&first.products).unwrap(),
            serde_json::to_string(&second.products).unwrap()
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_stale_reads_share_one_refresh() {
        let (scraper, calls) = CountingScraper::new(vec![record("jeans", 999)]);
        let finder = finder_with(scraper).await;

        let (a, b) = tokio::join!(finder.trends_for("jeans"), finder.trends_for("jeans"));

        assert_eq!(a.unwrap().unwrap().products.len(), 1);
        assert_eq!(b.unwrap().unwrap().products.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn entries_keep_only_the_cheapest_top_n() {
        let products: Vec<ProductRecord> = (1..=8)
            .map(|i| record(&format!("item-{i}"), i * 100))
            .collect();
        let (scraper, _calls) = CountingScraper::new(products);
        let finder = finder_with(scraper).await;

        let entry = finder.trends_for("kurta").await.unwrap().unwrap();

        assert_eq!(entry.products.len(), TREND_TOP_N);
        let prices: Vec<i64> = entry
            .products
            .iter()
            .map(|p| p.price.as_ref().unwrap().minor)
            .collect();
        assert!(prices.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(prices[0], 10_000);
    }

    #[tokio::test]
    async fn failed_refresh_serves_last_known_good_data() {
        let finder = finder_with(Arc::new(FailingScraper {
            config: stub_config("Myntra"),
        }))
        .await;

        finder
            .store
            .upsert("jeans", &[record("jeans", 999)])
            .await
            .unwrap();
        finder
            .store
            .set_updated_at("jeans", Utc::now() - Duration::hours(25))
            .await
            .unwrap();

        let served = finder.trends_for("jeans").await.unwrap().unwrap();
        assert_eq!(served.products.len(), 1);
        assert_eq!(served.products[0].name, "jeans");
    }

    #[tokio::test]
    async fn forced_refresh_with_no_products_leaves_the_store_untouched() {
        let finder = finder_with(Arc::new(FailingScraper {
            config: stub_config("Myntra"),
        }))
        .await;

        assert!(finder.force_refresh("jeans").await.unwrap().is_none());
        assert!(finder.store.get("jeans").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn forced_refresh_replaces_a_fresh_entry() {
        let (scraper, calls) = CountingScraper::new(vec![record("new-jeans", 799)]);
        let finder = finder_with(scraper).await;

        finder
            .store
            .upsert("jeans", &[record("old-jeans", 999)])
            .await
            .unwrap();

        let refreshed = finder.force_refresh("jeans").await.unwrap().unwrap();
        assert_eq!(refreshed.products[0].name, "new-jeans");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
