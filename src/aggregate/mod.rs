//! Cross-tabulation and its renderings.

pub mod crosstab;
pub mod render;

pub use crosstab::*;
pub use render::*;
