#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(missing_docs, unreachable_pub)]
#![allow(clippy::module_name_repetitions)]

//! File lifecycle management for transform requests.
//!
//! Untrusted filenames are reduced to their final segment, content lands in a single
//! managed directory under per-request unique names, and every handle is released on
//! every exit path of the request that owns it.

pub mod error;
pub mod filename;
pub mod mime;
pub mod store;
pub mod temp;

pub use error::{FsOpsError, FsOpsResult};
pub use filename::{SanitizedName, sanitize_filename, target_filename};
pub use mime::extension_for_media_type;
pub use store::{ContentStore, SharedFileStore};
pub use temp::{AcquiredSource, TempFileHandle, TempFileManager};
