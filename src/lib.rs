pub mod audit;
pub mod bookings;
pub mod config;
pub mod engine;
pub mod error;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod reconciler;
pub mod store;
pub mod wal;

#[cfg(test)]
mod test_support;
