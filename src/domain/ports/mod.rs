mod latency_store;
mod message_store;
mod target_repository;
mod transport;

pub use latency_store::LatencyStore;
pub use message_store::MessageStore;
pub use target_repository::TargetRepository;
pub use transport::{Transport, TransportResponse};
