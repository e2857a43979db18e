//! Extraction strategy dispatch.
//!
//! Routes a selected track by codec:
//!
//! | Codec | Path |
//! |---|---|
//! | SRT, WebVTT, other text | copy the stream, then correct the file |
//! | ASS/SSA, USF, TTML | copy the stream as is |
//! | PGS, DVB | dump the bitmaps, OCR them, delete the dump |
//! | VobSub | manual tool required, nothing extracted |
//! | unknown | `UnsupportedCodec` |

mod cleanup;
mod dispatcher;
mod types;

pub use cleanup::{remove_dir_with_retry, remove_file_with_retry, remove_with_retry, CleanupError, RetryPolicy};
pub use dispatcher::{DispatchRequest, Dispatcher, FileRemover};
pub use types::{CleanupStatus, DispatchOutcome, ExtractionMethod};
