//! Network and resource awareness.
//!
//! Sources on network storage are slower to read and more likely to
//! hold file locks. The queue uses [`classify_path`] when an item is
//! added and [`estimate_processing_time`] for its time estimate; the
//! coordinator reports network counts and estimated vs actual time.

mod estimate;
mod location;

pub use estimate::estimate_processing_time;
pub use location::{classify_path, classify_with_mounts, is_network_filesystem, parse_mounts, MountEntry};
