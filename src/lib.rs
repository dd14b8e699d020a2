pub mod api;
pub mod audit;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod state;
