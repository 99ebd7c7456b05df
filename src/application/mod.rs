//! Application Layer - Pipeline orchestration
//!
//! Wires the domain rules to the ports:
//! - `resolver`: market-cap provider chain with fallback
//! - `executor`: cooldown-gated buys, sells with precision retry
//! - `dispatcher`: announcement → buys → post-buy exits
//! - `supervisor`: restarts the signal source and owns signal tasks

pub mod error;
pub mod resolver;
pub mod executor;
pub mod dispatcher;
pub mod supervisor;

pub use error::{PipelineError, Stage};
pub use resolver::MarketCapResolver;
pub use executor::{BuyOutcome, OrderExecutor};
pub use dispatcher::{DispatchReport, DispatcherSettings, SellOutcome, SignalDispatcher};
pub use supervisor::Supervisor;
