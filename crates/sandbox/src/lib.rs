//! Sandbox session lifecycle (C6) and Docker container driver (C7).
//!
//! Grounded on `original_source/app/services/ptc/sandbox.py` throughout: the
//! session dataclass, the `SandboxSessionManager`'s create/get/close/reap
//! cycle, and the container-attach-before-start ordering the Docker-in-Docker
//! constraint requires.

pub mod driver;
pub mod error;
pub mod protocol;
pub mod runner;
pub mod session;

pub use error::{Result, SandboxError};
pub use session::{PendingExecution, RunnerKind, SessionHandle, SessionLimits, SessionStore, format_expires_at};
