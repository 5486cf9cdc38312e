pub mod cli;
pub mod colors;
pub mod config;
pub mod error;
pub mod grid;
pub mod notify;
pub mod queue;
pub mod repository;
pub mod setter;
pub mod theme;
pub mod thumbs;
pub mod ui;
