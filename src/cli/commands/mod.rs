pub mod config;
pub mod demo;
pub mod import;
pub mod load;
pub mod providers;
