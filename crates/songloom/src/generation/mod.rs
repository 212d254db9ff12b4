//! Generation job lifecycle: submission, polling and materialization.

pub mod assets;
pub mod job;
pub(crate) mod lenient;
pub mod locks;
pub mod orchestrator;
pub mod params;

pub use assets::{audio_extension, is_supported_audio_upload};
pub use job::{GenerationJob, GenerationResult, JobStatus, JobView, SubmittedJob};
pub use locks::JobLocks;
pub use orchestrator::{Orchestrator, ReferenceUpload, HISTORY_LIMIT};
pub use params::GenerationParams;
