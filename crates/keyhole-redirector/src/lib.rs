//! Key resolution for Keyhole.
//!
//! [`RedirectorService`] looks keys up in any [`ReadRepository`] and hands
//! back the stored record; turning that into an HTTP redirect is left to the
//! gateway.
//!
//! ```rust
//! use keyhole_redirector::RedirectorService;
//! use keyhole_storage::InMemoryRepository;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let service = RedirectorService::new(InMemoryRepository::new());
//!
//! if let Some(record) = service.resolve_str("abc123").await? {
//!     println!("Redirect to: {}", record.original_url);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! [`ReadRepository`]: keyhole_core::ReadRepository

pub mod error;
pub mod redirector;
pub mod service;

pub use error::{RedirectorError, Result};
pub use redirector::Redirector;
pub use service::RedirectorService;
