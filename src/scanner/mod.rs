pub mod new_listings;
pub mod symbol;

pub use new_listings::{
    diff_announcements, diff_markets, is_listing_title, ExchangeCheck, ListingEvent,
    NewListingDetector, Source, BASELINE_NOTICE_LIMIT, LISTING_KEYWORDS,
};
pub use symbol::{coin_symbol_or_unknown, extract_coin_symbol, UNKNOWN_SYMBOL};
