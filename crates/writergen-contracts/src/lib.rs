//! Pure types shared by the WriterGen engine and any host surface.

pub mod canvas;
pub mod capability;
pub mod errors;
pub mod models;
pub mod normalize;
pub mod prompts;
pub mod request;
pub mod surface;
pub mod view;

pub use capability::{CapabilityKind, Language};
pub use errors::{Failure, FailureKind, GenerationError};
pub use normalize::{Normalized, Recovery};
pub use request::{Completion, GenerationRequest, NormalizedResult, RequestStatus, Ticket};
