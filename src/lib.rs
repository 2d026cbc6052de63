#![doc = include_str!("../README.md")]

pub mod aggregate;
pub mod api_error;
pub mod client;
pub mod config;
pub mod error;
pub mod inventory;
pub mod models;
pub mod session;
pub mod transport;
pub mod types;
#[cfg(feature = "web")]
pub mod web;

#[cfg(test)]
mod testing;

// Re-exports for convenient access
pub use aggregate::{
    Aggregable, AggregatedRow, Aggregator, BottleRecord, BottleRow, IdentityKey, aggregate,
};
pub use api_error::ErrorDetail;
pub use client::SessionClient;
pub use config::ClientConfig;
pub use error::Error;
pub use inventory::BottleOverview;
pub use models::{Bottle, BottleForm, Cellar, CellarForm, NewUser, User, UserUpdate};
pub use session::{Session, SessionHandle};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Transport, TransportError};
pub use types::{BottleId, CellarId, UserId};
