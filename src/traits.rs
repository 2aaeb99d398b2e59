//! Traits and interfaces for site-agnostic product scraping

use anyhow::Result;
use async_trait::async_trait;

use crate::models::ProductRecord;

/// Configuration for a site scraper
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    /// Display name for the site
    pub name: String,
    /// Base URL for the site
    pub base_url: String,
    /// Search URL pattern with {query} placeholder
    pub search_url_pattern: String,
    /// CSS selectors for extracting data
    pub selectors: SiteSelectors,
}

/// CSS selectors for different parts of a product listing
#[derive(Debug, Clone)]
pub struct SiteSelectors {
    /// Container selector for individual products
    pub product_container: String,
    /// Product name selector within product container
    pub name: String,
    /// Brand selector within product container (optional)
    pub brand: Option<String>,
    /// Effective price selector within product container
    pub price: String,
    /// Struck-through original price selector (optional)
    pub original_price: Option<String>,
    /// Discounted price selector (optional)
    pub discounted_price: Option<String>,
    /// Product link selector within product container
    pub link: String,
    /// Image selector within product container
    pub image: String,
}

/// Trait for site-specific scrapers
#[async_trait]
pub trait SiteScraper: Send + Sync {
    /// Get the configuration for this scraper
    fn config(&self) -> &ScraperConfig;

    /// Search the site for products matching `query`
    ///
    /// # Returns
    /// * `Result<Vec<ProductRecord>>` - Up to `limit` raw product records or
    ///   a scraping error
    async fn scrape(&self, query: &str, limit: usize) -> Result<Vec<ProductRecord>>;

    /// Process a search query to create the search URL
    ///
    /// # Arguments
    /// * `query` - The term to search for
    ///
    /// # Returns
    /// * `String` - The complete search URL
    fn build_search_url(&self, query: &str) -> String {
        let encoded_query = urlencoding::encode(query);
        self.config()
            .search_url_pattern
            .replace("{query}", &encoded_query)
    }

    /// Get the user agent string for HTTP requests
    #[allow(dead_code)]
    fn user_agent(&self) -> &'static str {
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36"
    }
}
