//! stowage - time-sharded blob storage over HTTP
//!
//! Clients `PUT` opaque byte payloads, the store persists each one as a
//! uniquely named file under a `<root>/<YYYY-MM-DD>/<HH>/` shard, and the
//! location returned at upload time retrieves or removes the blob later.
//!
//! ## Storage layout
//!
//! ```text
//! <store root>/
//! ├── 2024-01-02/
//! │   └── 03/
//! │       └── 9f8e7d6c-5b4a-4f3e-8d2c-1b0a9f8e7d6c.png
//! └── .stage-Xw3kQz.png      # in-flight upload staging
//! ```
//!
//! ## Guarantees
//!
//! - A blob is published with one atomic same-filesystem rename; a
//!   concurrent reader sees either nothing or the whole payload, never a
//!   partial write.
//! - The store never overwrites an existing blob.
//! - Shard directories are created lazily; concurrent creators racing on
//!   the same shard all succeed.
//! - Deletion is idempotent: removing a missing blob is 404, not a fault.

pub mod blob_store;
pub mod config;
pub mod error;
pub mod http;
pub mod paths;
pub mod shard;
pub mod sniff;

// Re-exports
pub use blob_store::{Blob, BlobStore, PutOutcome};
pub use config::Config;
pub use error::StoreError;
pub use http::HttpServer;
