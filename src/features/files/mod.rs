pub mod dtos;
pub mod handlers;
pub mod models;
pub mod policy;
pub mod repositories;
pub mod routes;
pub mod services;

pub use repositories::PgFileRepository;
pub use routes::routes;
pub use services::FileService;
