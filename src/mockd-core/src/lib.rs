pub mod core;
pub mod models;

pub use crate::core::*;
pub use crate::models::*;
pub use mockd_errors::{Result, ServiceError, StoreError, TransferError};
pub use uuid::Uuid;
