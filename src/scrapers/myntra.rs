//! Myntra.com specific scraper implementation

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use scraper::Html;
use tracing::info;

use crate::models::ProductRecord;
use crate::scrapers::{extract_products, fetch_html};
use crate::traits::{ScraperConfig, SiteScraper, SiteSelectors};

/// Scraper implementation for Myntra.com
pub struct MyntraScraper {
    client: Client,
    config: ScraperConfig,
}

impl MyntraScraper {
    /// Create a new Myntra scraper with default configuration
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent("Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36")
            .timeout(Duration::from_secs(30))
            .build()?;

        let config = ScraperConfig {
            name: "Myntra".to_string(),
            base_url: "https://www.myntra.com".to_string(),
            search_url_pattern: "https://www.myntra.com/{query}".to_string(),
            selectors: SiteSelectors {
                product_container: "li.product-base".to_string(),
                name: "h4.product-product".to_string(),
                brand: Some("h3.product-brand".to_string()),
                price: "div.product-price".to_string(),
                original_price: Some("span.product-strike".to_string()),
                discounted_price: Some("span.product-discountedPrice".to_string()),
                link: "a".to_string(),
                image: "img.img-responsive".to_string(),
            },
        };

        Ok(Self { client, config })
    }
}

#[async_trait]
impl SiteScraper for MyntraScraper {
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

    // Myntra search URLs are kebab-case path segments, not query parameters
    fn build_search_url(&self, query: &str) -> String {
        let lowered = query.trim().to_lowercase();
        let kebab_query = lowered.split_whitespace().collect::<Vec<_>>().join("-");
        let encoded_query = urlencoding::encode(&kebab_query);
        self.config
            .search_url_pattern
            .replace("{query}", &encoded_query)
    }
}

impl Clone for MyntraScraper {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            config: self.config.clone(),
        }
    }
}
