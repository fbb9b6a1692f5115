pub mod db;
pub mod ingest;
pub mod search;

pub use db::{Db, StoreStats};
pub use ingest::{load_entries, upsert_entry, LoadMode, LoadReport};
pub use search::{
    age_ranges, available_features, price_range, search_toys, toy_types, years_to_months,
    AgeRange, PriceRange, SearchCriteria, SortOrder, Toy, ToyImage, ToyListing,
};
