// Ticker resolution — cache plus language-service lookup for filings whose
// file names carry no usable ticker.

pub mod cache;
pub mod resolver;

pub use cache::TickerCache;
pub use resolver::TickerResolver;
