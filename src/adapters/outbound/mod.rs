mod dashmap_latency_store;
mod http_transport;
mod sqlite_store;

pub use dashmap_latency_store::{DashMapLatencyStore, DEFAULT_RETENTION};
pub use http_transport::HttpTransport;
pub use sqlite_store::SqliteStore;
