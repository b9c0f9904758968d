//! Database repositories
//!
//! Persistence for the operation log.

pub mod operation_repository;

pub use operation_repository::OperationRepository;
