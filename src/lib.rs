pub mod app;
pub mod cli;
pub mod cloud;
pub mod credentials;
pub mod error;
pub mod logging;
pub mod notify;
pub mod retention;
pub mod types;
