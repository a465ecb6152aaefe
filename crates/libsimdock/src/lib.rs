//! Core subsystem of the simdock workspace server: sandboxed per-session
//! file storage, snapshot save/restore, and background-job orchestration.

pub mod engine;
pub mod error;
pub mod fsutil;
pub mod paths;
pub mod session;
pub mod snapshot;
pub mod store;
pub mod sweep;
pub mod tasks;

pub use engine::{ArtifactFile, DemoEngine, EngineError, JobContext, SimulationEngine};
pub use error::SimdockError;
pub use session::{SessionManager, session_dir_name};
pub use snapshot::SnapshotStore;
pub use tasks::{JobHandles, TaskOrchestrator};
