pub mod models;

mod session;
pub use session::*;
