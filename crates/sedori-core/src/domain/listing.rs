use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ProviderId;

/// Unified shipping condition across marketplace search results.
///
/// Yahoo reports a `shipping.code` (2 = free, 3 = conditionally free),
/// Rakuten a `postageFlag` (0 = included in price).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShippingCondition {
    Included,
    ConditionalFree,
    Extra,
    Unknown,
}

impl ShippingCondition {
    pub const fn from_yahoo_code(code: i64) -> Self {
        match code {
            2 => Self::Included,
            3 => Self::ConditionalFree,
            _ => Self::Extra,
        }
    }

    pub const fn from_rakuten_flag(flag: i64) -> Self {
        match flag {
            0 => Self::Included,
            _ => Self::Extra,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Included => "included",
            Self::ConditionalFree => "conditional_free",
            Self::Extra => "extra",
            Self::Unknown => "unknown",
        }
    }
}

impl Display for ShippingCondition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One marketplace listing found for a JAN code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingHit {
    pub jan: String,
    pub provider: ProviderId,
    pub price: i64,
    pub shipping: ShippingCondition,
    pub url: String,
}

/// Catalog attributes for one product code (SP-API catalog endpoint).
///
/// Package dimensions are stored longest edge first, in centimeters;
/// weight in grams.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CatalogItem {
    pub asin: Option<String>,
    pub jan: Option<String>,
    pub title: Option<String>,
    pub brand: Option<String>,
    pub manufacturer: Option<String>,
    pub list_price: Option<f64>,
    pub package_dimensions_cm: Vec<f64>,
    pub package_weight_g: Option<f64>,
    pub sales_rank: Option<u64>,
    pub image_url: Option<String>,
}

/// Competitive pricing summary for one ASIN (SP-API pricing endpoint).
///
/// All prices are in the marketplace currency's minor-free unit (JPY has
/// no minor unit, so these are plain yen amounts).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PricingSummary {
    pub asin: String,
    pub featured_price: Option<i64>,
    pub featured_shipping: Option<i64>,
    pub featured_points: Option<i64>,
    pub featured_seller_id: Option<String>,
    pub lowest_fba_price: Option<i64>,
    pub lowest_merchant_price: Option<i64>,
    pub amazon_offer_present: bool,
    pub fba_offer_count: u32,
    pub merchant_offer_count: u32,
    pub total_new_offer_count: u32,
}

impl PricingSummary {
    pub fn empty(asin: impl Into<String>) -> Self {
        Self {
            asin: asin.into(),
            ..Self::default()
        }
    }
}

/// Historical product snapshot for one ASIN (Keepa product endpoint).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProductSnapshot {
    pub asin: String,
    pub ean: Option<String>,
    pub title: Option<String>,
    pub brand: Option<String>,
    pub current_amazon_price: Option<i64>,
    pub current_new_price: Option<i64>,
    pub avg90_new_price: Option<i64>,
    pub sales_drops_30: Option<i64>,
    pub sales_drops_90: Option<i64>,
    pub total_offer_count: Option<i64>,
}
