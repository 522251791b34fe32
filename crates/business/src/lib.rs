//! # Mobiwallet Business
//!
//! Business logic layer - Account security, Transfer engine, History feed.
//!
//! Every transport adapter goes through the same three services built on a
//! shared [`ServiceContext`].

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod health;
pub mod history;
pub mod security;
pub mod services;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::WalletConfig;
pub use engine::TransferEngine;
pub use error::{NotOperableReason, SecurityError, SecurityResult, TransferError, TransferResult};
pub use health::{HealthMonitor, HealthStatus};
pub use history::{ActivitySummary, HistoryFeed};
pub use security::{AccountSecurityService, LoginOutcome, Registration};
pub use services::ServiceContext;
