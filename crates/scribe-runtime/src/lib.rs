//! Async runtime for Scribe.
//!
//! This crate runs platform integrations resiliently:
//! - `BotSupervisor` - one task per integration, with restarts and failure isolation
//! - `RateLimiter` - minimum spacing between posts with bounded reservations
//! - `BackoffPolicy` - monotonic exponential backoff for rate-limit errors
//!
//! # Example
//!
//! ```ignore
//! use scribe_runtime::{BotSupervisor, SupervisorConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut supervisor = BotSupervisor::new(SupervisorConfig::default());
//!     supervisor.register("twitter", || Ok(Box::new(build_bot()?) as _))?;
//!
//!     let mut events = supervisor.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     supervisor
//!         .run_until(async { let _ = tokio::signal::ctrl_c().await; })
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod backoff;
pub mod config;
pub mod error;
pub mod event;
pub mod rate_limit;
pub mod supervisor;
pub mod task;

pub use backoff::BackoffPolicy;
pub use config::SupervisorConfig;
pub use error::{Result, RuntimeError};
pub use event::SupervisorEvent;
pub use rate_limit::{RateLimiter, SlotGrant};
pub use supervisor::BotSupervisor;
pub use task::{CycleError, Integration, IntegrationFactory, TaskState};
