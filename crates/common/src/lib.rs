//! Common utilities and shared types for docreq.
//!
//! This crate provides foundational components used across all docreq crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **ID Generation**: Request references and stored file names via [`IdGenerator`]
//! - **Storage**: Upload policy and file storage backends
//!
//! # Example
//!
//! ```no_run
//! use docreq_common::{Config, IdGenerator, AppResult};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let id_gen = IdGenerator::new();
//!     let reference = id_gen.generate_reference(chrono::Utc::now().date_naive());
//!     println!("{} listening on {}", reference, config.server.port);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod id;
pub mod storage;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use id::IdGenerator;
pub use storage::{
    LocalStorage, StorageBackend, UploadPolicy, UploadedFile, generate_storage_key,
    mime_for_extension, store_upload,
};
