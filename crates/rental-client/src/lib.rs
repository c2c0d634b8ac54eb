//! Phone-number rental API client.

mod backend;
mod client;
mod error;
mod types;

pub use backend::RentalBackend;
pub use client::RentalClient;
pub use error::RentalApiError;
pub use types::*;
