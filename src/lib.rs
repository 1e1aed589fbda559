//! # song-dl
//!
//! Download orchestration core for mobile music players.
//!
//! ## Design Philosophy
//!
//! song-dl is designed to be:
//! - **Bounded** - At most `max_concurrent_downloads` pipelines run at once, the rest wait in FIFO order
//! - **Durable** - Every task is persisted and recovered after a restart
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use song_dl::{Config, DownloadService, SongRef};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = DownloadService::open(Config::default()).await?;
//!
//!     // Subscribe to events
//!     let mut events = service.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let mut song = SongRef::new("1862041", "Song Title", "Artist", "netease");
//!     song.audio_url = Some("https://cdn.example.com/1862041.mp3".to_string());
//!     let id = service.download(song)?;
//!     println!("queued {id}");
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Existence and progress cache
pub mod cache;
/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Task scheduler (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// Local library capability
pub mod library;
/// Staged per-task download procedure
pub mod pipeline;
/// Song resolution capability and HTTP implementation
pub mod resolver;
/// Retry logic with exponential backoff
pub mod retry;
/// Duplicate-rejecting caller layer
pub mod service;
/// Core types
pub mod types;
/// Path derivation and disk helpers
pub mod utils;

// Re-export commonly used types
pub use cache::{DiskExistence, ExistenceCheck, StateCache};
pub use config::{
    CacheConfig, Config, DiskSpaceConfig, DownloadConfig, PersistenceConfig, RetryConfig,
};
pub use db::Database;
pub use downloader::{Collaborators, DownloadScheduler};
pub use error::{DatabaseError, DownloadError, Error, Result};
pub use library::{LibraryRecord, LibraryWriter, NoOpLibrary};
pub use pipeline::{DownloadPipeline, PipelineContext};
pub use resolver::{HttpResolver, SongResolver};
pub use service::DownloadService;
pub use types::{Artifact, DownloadTask, Event, QueueStats, SongRef, Status, TaskId};
