//! Narrative composition and report rendering.

pub mod axis;
pub mod composer;
pub mod generator;

pub use axis::*;
pub use composer::*;
pub use generator::*;
