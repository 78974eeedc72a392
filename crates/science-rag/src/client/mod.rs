//! Client side of the orchestration API: HTTP client, session state,
//! smoke harness and the interactive console.

pub mod api;
pub mod harness;
#[cfg(feature = "cli")]
pub mod repl;
pub mod session;

pub use api::ApiClient;
pub use harness::{run_smoke, SmokeOptions, SmokeReport, StepOutcome};
pub use session::{ChatTurn, DatasetHandle, Session, SessionError, SessionStage};
