pub mod config;
pub mod lookup;
pub mod observability;
pub mod scores;
