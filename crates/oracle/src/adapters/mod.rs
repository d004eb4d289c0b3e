//! The standard adapter set.

mod http_fetcher;
mod last_value;
mod median;

pub use http_fetcher::HttpFetcher;
pub use last_value::LastValue;
pub use median::Median;
