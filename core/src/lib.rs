pub mod app;
pub mod auth;
pub mod collection;
pub mod db;
pub mod error;
pub mod models;
pub mod nutrition;
pub mod settings;
pub mod slices;
pub mod store;
pub mod theme;

pub use error::{Error, Result};
