pub mod collector;
pub mod config;
pub mod error;
pub mod page;
pub mod tracking;
