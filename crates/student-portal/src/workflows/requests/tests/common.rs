use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use serde_json::Value;

use crate::config::{BackendConfig, UploadConfig};
use crate::workflows::requests::domain::{
    ApplicantDetails, Attachment, FileType, NewRequest, NewUploadedFile, OwnerId, RequestId,
    RequestNumber, RequestRecord, RequestSubmission, ServiceType, StatusUpdate, UploadedFile,
};
use crate::workflows::requests::memory::{InMemoryObjectStorage, InMemoryRequestStore};
use crate::workflows::requests::repository::{
    CreatedWindow, ObjectStorage, RepositoryError, RequestFilter, RequestRepository, StorageError,
    StoragePath, StoredObject,
};
use crate::workflows::requests::service::RequestService;
use crate::workflows::requests::session::{Role, Session};

pub(super) const MIB: usize = 1024 * 1024;

pub(super) fn upload_policy() -> UploadConfig {
    UploadConfig::default()
}

pub(super) fn backend() -> BackendConfig {
    BackendConfig {
        timeout: Duration::from_millis(250),
        ..BackendConfig::default()
    }
}

pub(super) fn service_with<R, S>(repository: Arc<R>, storage: Arc<S>) -> RequestService<R, S>
where
    R: RequestRepository + 'static,
    S: ObjectStorage + 'static,
{
    RequestService::new(repository, storage, upload_policy(), backend())
}

pub(super) fn build_service() -> (
    RequestService<InMemoryRequestStore, InMemoryObjectStorage>,
    Arc<InMemoryRequestStore>,
    Arc<InMemoryObjectStorage>,
) {
    let store = Arc::new(InMemoryRequestStore::default());
    let storage = Arc::new(InMemoryObjectStorage::default());
    let service = service_with(store.clone(), storage.clone());
    (service, store, storage)
}

pub(super) fn student() -> Session {
    Session::sign_in(OwnerId("student-1".to_string()), Role::Student)
}

pub(super) fn other_student() -> Session {
    Session::sign_in(OwnerId("student-2".to_string()), Role::Student)
}

pub(super) fn admin() -> Session {
    Session::sign_in(OwnerId("admin-1".to_string()), Role::Admin)
}

pub(super) fn applicant() -> ApplicantDetails {
    ApplicantDetails {
        first_name: " Amal ".to_string(),
        last_name: "Haddad".to_string(),
        university_name: Some("Cairo University".to_string()),
        major: Some("  ".to_string()),
        additional_notes: None,
    }
}

pub(super) fn pdf(file_type: FileType, file_name: &str, size: usize) -> Attachment {
    Attachment {
        file_type,
        file_name: file_name.to_string(),
        content_type: "application/pdf".to_string(),
        bytes: vec![b'%'; size],
    }
}

pub(super) fn submission(service_type: ServiceType, attachments: Vec<Attachment>) -> RequestSubmission {
    RequestSubmission {
        service_type,
        applicant: applicant(),
        attachments,
    }
}

pub(super) fn passport_renewal() -> RequestSubmission {
    submission(
        ServiceType::PassportRenewal,
        vec![pdf(FileType::Passport, "passport.pdf", 2 * MIB)],
    )
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

/// Answers `Conflict` to the first `conflicts` inserts, then behaves like the
/// in-memory store.
#[derive(Default)]
pub(super) struct ConflictingRepository {
    pub(super) inner: InMemoryRequestStore,
    conflicts: usize,
    attempts: AtomicUsize,
}

impl ConflictingRepository {
    pub(super) fn new(conflicts: usize) -> Self {
        Self {
            conflicts,
            ..Self::default()
        }
    }

    pub(super) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RequestRepository for ConflictingRepository {
    async fn insert_request(&self, request: NewRequest) -> Result<RequestRecord, RepositoryError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.conflicts {
            return Err(RepositoryError::Conflict);
        }
        self.inner.insert_request(request).await
    }

    async fn insert_file(&self, file: NewUploadedFile) -> Result<UploadedFile, RepositoryError> {
        self.inner.insert_file(file).await
    }

    async fn find_by_number(
        &self,
        number: &RequestNumber,
        window: CreatedWindow,
    ) -> Result<Option<RequestRecord>, RepositoryError> {
        self.inner.find_by_number(number, window).await
    }

    async fn fetch(&self, id: &RequestId) -> Result<Option<RequestRecord>, RepositoryError> {
        self.inner.fetch(id).await
    }

    async fn update_status(&self, update: StatusUpdate) -> Result<RequestRecord, RepositoryError> {
        self.inner.update_status(update).await
    }

    async fn list(&self, filter: RequestFilter) -> Result<Vec<RequestRecord>, RepositoryError> {
        self.inner.list(filter).await
    }

    async fn files_for(&self, id: &RequestId) -> Result<Vec<UploadedFile>, RepositoryError> {
        self.inner.files_for(id).await
    }
}

/// Stores requests but refuses every file row.
#[derive(Default)]
pub(super) struct FileRowFailureRepository {
    pub(super) inner: InMemoryRequestStore,
}

#[async_trait]
impl RequestRepository for FileRowFailureRepository {
    async fn insert_request(&self, request: NewRequest) -> Result<RequestRecord, RepositoryError> {
        self.inner.insert_request(request).await
    }

    async fn insert_file(&self, _file: NewUploadedFile) -> Result<UploadedFile, RepositoryError> {
        Err(RepositoryError::Unavailable("files table offline".to_string()))
    }

    async fn find_by_number(
        &self,
        number: &RequestNumber,
        window: CreatedWindow,
    ) -> Result<Option<RequestRecord>, RepositoryError> {
        self.inner.find_by_number(number, window).await
    }

    async fn fetch(&self, id: &RequestId) -> Result<Option<RequestRecord>, RepositoryError> {
        self.inner.fetch(id).await
    }

    async fn update_status(&self, update: StatusUpdate) -> Result<RequestRecord, RepositoryError> {
        self.inner.update_status(update).await
    }

    async fn list(&self, filter: RequestFilter) -> Result<Vec<RequestRecord>, RepositoryError> {
        self.inner.list(filter).await
    }

    async fn files_for(&self, id: &RequestId) -> Result<Vec<UploadedFile>, RepositoryError> {
        self.inner.files_for(id).await
    }
}

pub(super) struct UnavailableRepository;

#[async_trait]
impl RequestRepository for UnavailableRepository {
    async fn insert_request(&self, _request: NewRequest) -> Result<RequestRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("offline".to_string()))
    }

    async fn insert_file(&self, _file: NewUploadedFile) -> Result<UploadedFile, RepositoryError> {
        Err(RepositoryError::Unavailable("offline".to_string()))
    }

    async fn find_by_number(
        &self,
        _number: &RequestNumber,
        _window: CreatedWindow,
    ) -> Result<Option<RequestRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("offline".to_string()))
    }

    async fn fetch(&self, _id: &RequestId) -> Result<Option<RequestRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("offline".to_string()))
    }

    async fn update_status(&self, _update: StatusUpdate) -> Result<RequestRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("offline".to_string()))
    }

    async fn list(&self, _filter: RequestFilter) -> Result<Vec<RequestRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("offline".to_string()))
    }

    async fn files_for(&self, _id: &RequestId) -> Result<Vec<UploadedFile>, RepositoryError> {
        Err(RepositoryError::Unavailable("offline".to_string()))
    }
}

/// Object store that never answers in time.
#[derive(Default)]
pub(super) struct StalledStorage;

#[async_trait]
impl ObjectStorage for StalledStorage {
    async fn put(
        &self,
        _path: &StoragePath,
        _bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<StoredObject, StorageError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Err(StorageError::Unavailable("stalled".to_string()))
    }

    async fn remove(&self, _path: &StoragePath) -> Result<(), StorageError> {
        Ok(())
    }
}
