pub mod aggregate;
pub mod config;
pub mod error;
pub mod fetch;
pub mod geometry;
pub mod history;
pub mod output;
pub mod process;
pub mod reference;
pub mod schema;
pub mod view;
