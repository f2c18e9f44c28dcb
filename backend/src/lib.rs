pub mod config;
pub mod detector;
pub mod routes;
