//! Student service requests: submission with attachments, status tracking and the
//! back-office status workflow.

pub(crate) mod attachments;
pub mod domain;
pub mod memory;
pub mod repository;
pub mod router;
pub mod service;
pub mod session;
pub mod status;
pub mod timeline;

#[cfg(test)]
mod tests;

pub use attachments::ValidationError;
pub use domain::{
    ApplicantDetails, Attachment, FileType, OwnerId, RequestId, RequestNumber, RequestRecord,
    RequestStatusView, RequestSubmission, ServiceType, SubmissionReceipt, TrackedRequest,
    UploadedFile,
};
pub use memory::{InMemoryObjectStorage, InMemoryRequestStore};
pub use repository::{
    ObjectStorage, RepositoryError, RequestRepository, StorageError, StoragePath,
};
pub use router::{request_router, session_from_headers};
pub use service::{RequestService, RequestServiceError};
pub use session::{Role, Session};
pub use status::{translate_status, Locale, RequestStatus};
pub use timeline::{build_timeline, StageDate, StatusDescriptor};
