pub mod deletion;
pub mod download;
pub mod error;
pub mod format;
pub mod listing;
pub mod metadata;
pub mod progress;
pub mod resolver;
pub mod slicer_service;
pub mod splitter;
pub mod transport;
pub mod upload;
