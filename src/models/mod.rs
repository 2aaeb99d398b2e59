//! Data models for scraped products and cached trend entries

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A price in minor currency units (paise for INR).
///
/// Prices are parsed once at extraction time by stripping the currency
/// symbol and separators from the site's display string. The display form
/// is derived via [`fmt::Display`], never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in minor units (1 rupee = 100 paise).
    pub minor: i64,
    /// ISO 4217 currency code.
    pub currency: String,
}

impl Price {
    /// Parse an INR display string like `"₹1,299"` or `"Rs. 2499"`.
    ///
    /// Strips every non-digit character and treats the remainder as a
    /// whole-rupee amount. Returns `None` for strings with no digits.
    pub fn parse_inr(raw: &str) -> Option<Self> {
        let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
        if digits.is_empty() {
            return None;
        }

        let rupees: i64 = digits.parse().ok()?;
        Some(Self {
            minor: rupees.checked_mul(100)?,
            currency: "INR".to_string(),
        })
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.minor % 100 == 0 {
            write!(f, "₹{}", self.minor / 100)
        } else {
            write!(f, "₹{}.{:02}", self.minor / 100, self.minor % 100)
        }
    }
}

/// A product listing scraped from one site's search results.
///
/// `price` is the effective price (the discounted one when the site shows
/// a discount). Records can leave `price` unset or `image` empty when the
/// listing didn't expose them; the aggregation step filters those out
/// before anything is stored or served.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    pub name: String,
    pub original_price: Option<Price>,
    pub discounted_price: Option<Price>,
    pub price: Option<Price>,
    /// Absolute image URL, or empty when the listing had no image.
    pub image: String,
    /// Absolute product page URL.
    pub link: String,
    /// Display name of the site the record came from.
    pub source: String,
}

/// A cached aggregation result for one search query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendEntry {
    pub search_query: String,
    pub products: Vec<ProductRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
