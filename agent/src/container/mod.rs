//! Container lifecycle management
//!
//! Drives a single application container through its OCI runtime states.
//! The runtime itself is an external process reached through [`runtime::OciRuntime`].

pub mod controller;
pub mod errors;
pub mod poll;
pub mod runc;
pub mod runtime;
pub mod state;

pub use controller::{ContainerController, ControllerOptions, StopOutcome};
pub use errors::LifecycleError;
pub use runtime::{OciRuntime, RuntimeError, Signal};
pub use state::ContainerState;
