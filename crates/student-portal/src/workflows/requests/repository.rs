use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};

use super::attachments::sanitize_file_name;
use super::domain::{
    FileType, NewRequest, NewUploadedFile, OwnerId, RequestId, RequestNumber, RequestRecord,
    StatusUpdate, UploadedFile,
};
use super::status::RequestStatus;

/// Relational side of the backend: the `requests` and `files` tables.
#[async_trait]
pub trait RequestRepository: Send + Sync {
    /// Inserts a request with status `submitted`. Returns `Conflict` when the request
    /// number is already taken, if the store enforces uniqueness.
    async fn insert_request(&self, request: NewRequest) -> Result<RequestRecord, RepositoryError>;
    async fn insert_file(&self, file: NewUploadedFile) -> Result<UploadedFile, RepositoryError>;
    async fn find_by_number(
        &self,
        number: &RequestNumber,
        window: CreatedWindow,
    ) -> Result<Option<RequestRecord>, RepositoryError>;
    async fn fetch(&self, id: &RequestId) -> Result<Option<RequestRecord>, RepositoryError>;
    async fn update_status(&self, update: StatusUpdate) -> Result<RequestRecord, RepositoryError>;
    /// Newest first.
    async fn list(&self, filter: RequestFilter) -> Result<Vec<RequestRecord>, RepositoryError>;
    async fn files_for(&self, id: &RequestId) -> Result<Vec<UploadedFile>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Half-open `created_at` range covering one calendar day (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreatedWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl CreatedWindow {
    pub fn for_day(date: NaiveDate) -> Self {
        let start = date.and_time(chrono::NaiveTime::MIN).and_utc();
        Self {
            start,
            end: start + Duration::days(1),
        }
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        self.start <= timestamp && timestamp < self.end
    }
}

/// Listing filter used by the dashboard and the back-office.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestFilter {
    pub owner_id: Option<OwnerId>,
    pub status: Option<RequestStatus>,
}

impl RequestFilter {
    pub fn matches(&self, record: &RequestRecord) -> bool {
        let owner_matches = self
            .owner_id
            .as_ref()
            .map_or(true, |owner| *owner == record.owner_id);
        let status_matches = self
            .status
            .map_or(true, |status| record.current_status() == Some(status));
        owner_matches && status_matches
    }
}

/// Blob side of the backend.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn put(
        &self,
        path: &StoragePath,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<StoredObject, StorageError>;
    async fn remove(&self, path: &StoragePath) -> Result<(), StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("payload rejected by storage: larger than {limit_bytes} bytes")]
    PayloadTooLarge { limit_bytes: u64 },
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Object key `{owner_id}/{request_id}/{file_type}/{filename}` inside the bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoragePath {
    bucket: String,
    key: String,
}

impl StoragePath {
    /// Returns `None` when the file name has no usable segment.
    pub fn for_attachment(
        bucket: &str,
        owner_id: &OwnerId,
        request_id: &RequestId,
        file_type: FileType,
        file_name: &str,
    ) -> Option<Self> {
        let file_name = sanitize_file_name(file_name)?;
        Some(Self {
            bucket: bucket.to_string(),
            key: format!(
                "{}/{}/{}/{}",
                owner_id.0.trim_matches('/'),
                request_id,
                file_type.as_str(),
                file_name
            ),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for StoragePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub path: StoragePath,
    pub size_bytes: u64,
}
