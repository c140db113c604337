pub mod default_city;
pub mod fetcher;
#[cfg(test)]
pub mod mock;
pub mod transport;
pub mod types;

pub use default_city::DefaultCityPointer;
pub use fetcher::{FetcherSettings, SnapshotFetcher};
pub use transport::HttpTransport;
