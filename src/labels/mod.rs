//! Raw answer codes to human-readable labels.
//!
//! Resolution walks an ordered chain of [`LabelSource`]s: fixed override
//! tables first, then the parsed codebook, then a placeholder that embeds the
//! raw code so nothing silently disappears.

pub mod resolver;
pub mod sources;

pub use resolver::*;
pub use sources::*;
