//! Reading and writing the tabular files at the system boundary.
//!
//! Inputs are the wide response CSV, the pre-aggregated CSV and the
//! definition document; outputs are the tidy CSV, the crosstab sheets and
//! the sample aggregate file.

pub mod error;
pub mod reader;
pub mod writer;

pub use error::*;
pub use reader::*;
pub use writer::*;
