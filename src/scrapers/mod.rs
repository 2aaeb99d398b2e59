//! Site scraper implementations and shared fetch/extract helpers

use anyhow::Result;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};

use crate::models::{Price, ProductRecord};
use crate::traits::ScraperConfig;

pub mod ajio;
pub mod myntra;

pub use ajio::AjioScraper;
pub use myntra::MyntraScraper;

/// Fetch a page and return its HTML body.
///
/// Non-2xx responses are errors; selector drift on a 2xx page is not
/// detectable here and shows up downstream as fewer extracted records.
pub(crate) async fn fetch_html(client: &Client, url: &str) -> Result<String> {
    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        return Err(anyhow::anyhow!(
            "Failed to fetch search page {}: {}",
            url,
            response.status()
        ));
    }

    Ok(response.text().await?)
}

/// Convert a possibly-relative href into an absolute URL for `base_url`.
pub(crate) fn absolutize(base_url: &str, href: &str) -> String {
    if href.starts_with("http") {
        href.to_string()
    } else if href.starts_with("//") {
        format!("https:{href}")
    } else if href.starts_with('/') {
        format!("{base_url}{href}")
    } else {
        format!("{base_url}/{href}")
    }
}

fn parse_selector(raw: &str) -> Result<Selector> {
    Selector::parse(raw).map_err(|e| anyhow::anyhow!("Failed to parse selector {raw:?}: {e:?}"))
}

fn select_text(product: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    product
        .select(selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
}

fn select_price(product: &ElementRef<'_>, selector: &Selector) -> Option<Price> {
    select_text(product, selector).and_then(|text| Price::parse_inr(&text))
}

/// Extract up to `limit` product records from a parsed search results page.
///
/// Reads the fixed selectors in `config`, skips listings with no name or no
/// link, and rewrites relative image/link URLs to absolute ones. Prices are
/// parsed to minor units here; listings whose price text doesn't parse keep
/// `price: None` and are dropped later by the aggregation filter.
pub(crate) fn extract_products(
    document: &Html,
    config: &ScraperConfig,
    limit: usize,
) -> Result<Vec<ProductRecord>> {
    let selectors = &config.selectors;

    let product_selector = parse_selector(&selectors.product_container)?;
    let name_selector = parse_selector(&selectors.name)?;
    let price_selector = parse_selector(&selectors.price)?;
    let link_selector = parse_selector(&selectors.link)?;
    let image_selector = parse_selector(&selectors.image)?;

    // Optional selectors
    let brand_selector = selectors
        .brand
        .as_deref()
        .map(parse_selector)
        .transpose()?;
    let original_price_selector = selectors
        .original_price
        .as_deref()
        .map(parse_selector)
        .transpose()?;
    let discounted_price_selector = selectors
        .discounted_price
        .as_deref()
        .map(parse_selector)
        .transpose()?;

    let mut products = Vec::new();

    for product in document.select(&product_selector) {
        if products.len() >= limit {
            break;
        }

        if let Some(link) = product.select(&link_selector).next()
            && let Some(href) = link.value().attr("href")
        {
            let link = absolutize(&config.base_url, href);

            let Some(product_name) = select_text(&product, &name_selector) else {
                continue;
            };

            let name = match brand_selector
                .as_ref()
                .and_then(|sel| select_text(&product, sel))
            {
                Some(brand) => format!("{brand} - {product_name}"),
                None => product_name,
            };

            let original_price = original_price_selector
                .as_ref()
                .and_then(|sel| select_price(&product, sel));
            let discounted_price = discounted_price_selector
                .as_ref()
                .and_then(|sel| select_price(&product, sel));
            let price = discounted_price
                .clone()
                .or_else(|| select_price(&product, &price_selector));

            let image = product
                .select(&image_selector)
                .next()
                .and_then(|img| {
                    // Try data-src first (for lazy loading), then src
                    img.value()
                        .attr("data-src")
                        .or_else(|| img.value().attr("src"))
                })
                .map(|src| absolutize(&config.base_url, src))
                .unwrap_or_default();

            products.push(ProductRecord {
                name,
                original_price,
                discounted_price,
                price,
                image,
                link,
                source: config.name.clone(),
            });
        }
    }

    Ok(products)
}
