//! Data models.

pub mod config;
pub mod form;
pub mod iteration;
pub mod result;
pub mod table;
