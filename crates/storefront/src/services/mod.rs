//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Password login, registration, Google sign-in, admin credentials
//! - `email` - Order confirmations and welcome emails via `SendGrid`
//! - `uploads` - Image uploads into the permanent and served directories
//! - `image_sync` - Reconciliation between the two upload directories
//! - `backup` - Table snapshots and best-effort restore
//! - `jobs` - Lifecycle of the periodic background passes

pub mod auth;
pub mod backup;
pub mod email;
pub mod image_sync;
pub mod jobs;
pub mod uploads;

pub use backup::{BackupError, BackupService};
pub use email::{EmailError, EmailService};
pub use image_sync::{ImageSyncError, SyncReport};
pub use jobs::JobScheduler;
pub use uploads::{UploadError, UploadStore};
