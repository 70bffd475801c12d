mod file_repository;
#[cfg(test)]
pub mod memory;

pub use file_repository::{FileRepository, PgFileRepository};
