//! # AlphaForge Brain Client
//!
//! Client and evaluation scheduler for the remote alpha evaluation platform.
//!
//! ## Pieces
//! - [`BrainClient`]: blocking HTTP session (credential exchange, simulation
//!   submission, metrics/correlation/competition endpoints)
//! - [`EvalScheduler`] / [`BatchScheduler`]: job state machine with a bounded
//!   in-flight window, auth-expiry recovery and transient-error retry
//! - [`PerformanceVector`]: the structured metrics recorded per candidate
//!
//! The scheduler only sees the [`SimulationApi`] trait and the [`Clock`]
//! trait, so the whole state machine runs in tests on scripted responses and
//! simulated time.

pub mod api;
pub mod client;
pub mod clock;
pub mod error;
pub mod metrics;
pub mod scheduler;
pub mod settings;

pub use api::{JobHandle, JobStatus, PollReply, SimulationApi};
pub use client::{BrainClient, Credentials, DEFAULT_BASE_URL, DEFAULT_COMPETITION};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::BrainError;
pub use metrics::{AlphaDocument, CorrelationBounds, PerformanceVector};
pub use scheduler::{BatchScheduler, EvalScheduler, DEFAULT_WINDOW};
pub use settings::{SimulationRequest, SimulationSettings};
