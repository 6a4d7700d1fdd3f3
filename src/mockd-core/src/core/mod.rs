pub mod boundaries;
pub mod debounce;
pub mod duplicates;
pub mod json_store;
pub mod memory;
pub mod migrations;
pub mod mutations;
pub(crate) mod reconcile;
pub mod service;
pub mod transfer;

pub use boundaries::*;
pub use debounce::MutationEvent;
pub use duplicates::*;
pub use json_store::*;
pub use memory::*;
pub use migrations::*;
pub use service::*;
pub use transfer::*;
