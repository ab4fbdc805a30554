pub mod config;
pub mod discovery;
pub mod listing;
pub mod observability;
pub mod pipeline;
pub mod worker;
