pub mod job;

pub use job::{JobApplicationDraft, JobApplicationRecord, JobSubmission};
