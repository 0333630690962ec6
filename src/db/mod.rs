pub mod connection;
pub mod models;
pub mod repositories;
pub mod retry;

pub use connection::*;
pub use repositories::*;
pub use retry::*;
