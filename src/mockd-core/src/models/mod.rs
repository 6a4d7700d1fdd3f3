pub mod environment;
pub mod raw;
pub mod route;
pub mod schema;

pub use environment::*;
pub use raw::*;
pub use route::*;
pub use schema::*;
