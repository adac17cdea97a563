pub mod browse;
pub mod config;
pub mod get;
pub mod roots;
pub mod search;
