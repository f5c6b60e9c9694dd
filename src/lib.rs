pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::Config;
pub use error::{AppError, AppResult};
