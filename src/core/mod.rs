pub mod config;
pub mod media;
pub mod transport;

#[cfg(test)]
mod config_test;

pub use config::*;
pub use media::*;
pub use transport::*;
