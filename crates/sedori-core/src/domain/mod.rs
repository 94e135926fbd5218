mod listing;
mod product_code;

pub use listing::{
    CatalogItem, ListingHit, PricingSummary, ProductSnapshot, ShippingCondition,
};
pub use product_code::{Asin, JanCode, ProductCode};
