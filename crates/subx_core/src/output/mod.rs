//! Output file naming.

mod pattern;

pub use pattern::{output_extension, OutputPattern, OutputPlanner};

pub(crate) use pattern::sanitize_file_stem;
