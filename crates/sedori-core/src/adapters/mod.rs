mod keepa;
mod rakuten;
mod sp_api;
mod yahoo;

pub use keepa::KeepaAdapter;
pub use rakuten::RakutenIchibaAdapter;
pub use sp_api::SpApiAdapter;
pub use yahoo::YahooShoppingAdapter;
