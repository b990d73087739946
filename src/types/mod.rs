//! Core types for captured frame data.

mod frame;

pub use frame::Frame;
