pub mod client;
pub mod error;
pub mod feed;
pub mod render;
pub mod views;

pub use client::{ConnectionState, Viewer, ViewerConfig};
pub use error::ViewerError;
