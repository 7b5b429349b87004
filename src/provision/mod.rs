pub mod coordinator;
pub mod error;
pub mod executor;
pub mod models;
pub mod resource;
pub mod status_gate;

pub use coordinator::{CreateOutcome, ProvisionTimeouts, Provisioner};
pub use error::ProvisionError;
pub use models::{
    DeletionPolicy, ExecutionOutcome, InstanceState, PhaseLog, ProvisionPhase, ProvisionRequest,
    ResourceIdentity,
};
