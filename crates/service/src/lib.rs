//! Service layer for service history records and their image attachments.
//! - Storage backends behind one trait; the owning backend of an image is
//!   derived from its public id.
//! - Image and record operations order storage calls and commits so failures
//!   leave orphaned objects rather than dangling rows.
//! - A migration job moving local images to the remote store.

pub mod errors;
pub mod images;
pub mod migration_job;
pub mod records;
pub mod runtime;
pub mod storage;
pub mod upload;
#[cfg(test)]
pub mod test_support;
#[cfg(test)]
mod tests;

pub use errors::ServiceError;
pub use images::{AssetRef, AttachResult, ImageAssetManager};
pub use migration_job::{MigrationJob, MigrationReport};
pub use records::ServiceRecordLifecycle;
pub use upload::{FileError, FileErrorKind, UploadFile, UploadPolicy};
