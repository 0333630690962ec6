pub mod settings_repository;
pub mod vote_repository;

#[cfg(test)]
pub mod memory;

pub use settings_repository::*;
pub use vote_repository::*;
