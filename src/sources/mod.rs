//! Built-in frame sources.

mod pattern;

pub use pattern::TestPattern;
