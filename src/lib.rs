//! deskpilot - desktop and browser automation agent
//!
//! Turns an instruction into a plan, runs it step by step against the live
//! desktop and a controlled browser, retries and recovers failed steps, and
//! records and replays human-performed workflows.
//!
//! ## Modules
//!
//! - **executor**: dispatch, retry, plan execution
//! - **recovery**: strategies tried when a step exhausts its retries
//! - **session**: [`AutomationSession`], the owning service
//! - **config**: timings, limits and credentials

pub mod config;
pub mod executor;
pub mod recovery;
pub mod session;

pub use config::Config;
pub use executor::{
    Capabilities, ExecutionLog, ExecutionResult, Executor, Outcome, PlanReport, StopHandle,
};
pub use recovery::{RecoveryChain, RecoveryContext, RecoveryStrategy, StrategyId};
pub use session::{AutomationSession, SessionBuilder};

pub mod prelude {
    pub use crate::config::Config;
    pub use crate::executor::{ExecutionResult, PlanReport, StopHandle};
    pub use crate::recovery::StrategyId;
    pub use crate::session::AutomationSession;
    pub use deskpilot_core::prelude::*;
    pub use deskpilot_recorder::prelude::*;
}
