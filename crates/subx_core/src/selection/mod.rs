//! Track selection.
//!
//! Given the tracks found by the prober and the user's preferences, pick
//! the one track to extract. See [`select_track`] for the cascade.

mod selector;

pub use selector::{select_track, SelectionPreferences};
