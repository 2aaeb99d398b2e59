//! Ajio.com specific scraper implementation

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use scraper::Html;
use tracing::info;

use crate::models::ProductRecord;
use crate::scrapers::{extract_products, fetch_html};
use crate::traits::{ScraperConfig, SiteScraper, SiteSelectors};

/// Scraper implementation for Ajio.com
pub struct AjioScraper {
    client: Client,
    config: ScraperConfig,
}

impl AjioScraper {
    /// Create a new Ajio scraper with default configuration
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent("Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36")
            .timeout(Duration::from_secs(30))
            .build()?;

        let config = ScraperConfig {
            name: "Ajio".to_string(),
            base_url: "https://www.ajio.com".to_string(),
            search_url_pattern: "https://www.ajio.com/search/?text={query}".to_string(),
            selectors: SiteSelectors {
                product_container: "div.item.rilrtl-products-list__item".to_string(),
                name: "div.nameCls".to_string(),
                brand: Some("div.brand strong".to_string()),
                price: "span.price strong".to_string(),
                original_price: Some("span.orig-price".to_string()),
                discounted_price: None,
                link: "a.rilrtl-products-list__link, a".to_string(),
                image: "img.rilrtl-lazy-img".to_string(),
            },
        };

        Ok(Self { client, config })
    }
}

#[async_trait]
impl SiteScraper for AjioScraper {
    fn config(&self) -> &ScraperConfig {
        &self.config
    }

    async fn scrape(&self, query: &str, limit: usize) -> Result<Vec<ProductRecord>> {
        let url = self.build_search_url(query);
        info!("Searching for '{}' on {}", query, self.config.name);

        let html = fetch_html(&self.client, &url).await?;
        let document = Html::parse_document(&html);
        let products = extract_products(&document, &self.config, limit)?;

        info!(
            "Found {} products on {} for '{}'",
            products.len(),
            self.config.name,
            query
        );
        Ok(products)
    }
}

impl Clone for AjioScraper {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            config: self.config.clone(),
        }
    }
}
