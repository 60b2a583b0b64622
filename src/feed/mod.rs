mod fetcher;
mod sources;

pub use fetcher::FeedFetcher;
pub use sources::{FeedSource, FEED_SOURCES};
