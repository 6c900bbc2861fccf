//! Process-local backend used by the development server, the CLI demo and tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::domain::{
    non_blank, NewRequest, NewUploadedFile, RequestId, RequestNumber, RequestRecord,
    StatusUpdate, UploadedFile,
};
use super::repository::{
    CreatedWindow, ObjectStorage, RepositoryError, RequestFilter, RequestRepository, StorageError,
    StoragePath, StoredObject,
};
use super::status::RequestStatus;

#[derive(Default)]
struct Tables {
    requests: HashMap<RequestId, RequestRecord>,
    files: Vec<UploadedFile>,
}

/// `requests` + `files` tables kept in memory. Request numbers are unique.
#[derive(Default, Clone)]
pub struct InMemoryRequestStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryRequestStore {
    fn lock(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        self.tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("request store lock poisoned".to_string()))
    }

    /// Overwrites a stored row, e.g. to simulate a status written by another client.
    pub fn put_record(&self, record: RequestRecord) -> Result<(), RepositoryError> {
        self.lock()?.requests.insert(record.id, record);
        Ok(())
    }

    pub fn request_count(&self) -> usize {
        self.lock().map(|tables| tables.requests.len()).unwrap_or_default()
    }

    pub fn file_count(&self) -> usize {
        self.lock().map(|tables| tables.files.len()).unwrap_or_default()
    }
}

#[async_trait]
impl RequestRepository for InMemoryRequestStore {
    async fn insert_request(&self, request: NewRequest) -> Result<RequestRecord, RepositoryError> {
        let mut tables = self.lock()?;
        if tables
            .requests
            .values()
            .any(|record| record.request_number == request.request_number)
        {
            return Err(RepositoryError::Conflict);
        }

        let record = RequestRecord {
            id: RequestId::new(),
            owner_id: request.owner_id,
            service_type: request.service_type,
            status: RequestStatus::Submitted.as_str().to_string(),
            request_number: request.request_number,
            submission_date: request.submission_date,
            applicant: request.applicant,
            admin_notes: None,
            created_at: request.created_at,
        };
        tables.requests.insert(record.id, record.clone());
        Ok(record)
    }

    async fn insert_file(&self, file: NewUploadedFile) -> Result<UploadedFile, RepositoryError> {
        let mut tables = self.lock()?;
        if !tables.requests.contains_key(&file.request_id) {
            return Err(RepositoryError::NotFound);
        }

        let stored = UploadedFile {
            id: Uuid::new_v4(),
            request_id: file.request_id,
            file_type: file.file_type,
            file_path: file.file_path,
            file_name: file.file_name,
            content_type: file.content_type,
            size_bytes: file.size_bytes,
            uploaded_at: Utc::now(),
        };
        tables.files.push(stored.clone());
        Ok(stored)
    }

    async fn find_by_number(
        &self,
        number: &RequestNumber,
        window: CreatedWindow,
    ) -> Result<Option<RequestRecord>, RepositoryError> {
        let tables = self.lock()?;
        Ok(tables
            .requests
            .values()
            .find(|record| record.request_number == *number && window.contains(record.created_at))
            .cloned())
    }

    async fn fetch(&self, id: &RequestId) -> Result<Option<RequestRecord>, RepositoryError> {
        Ok(self.lock()?.requests.get(id).cloned())
    }

    async fn update_status(&self, update: StatusUpdate) -> Result<RequestRecord, RepositoryError> {
        let mut tables = self.lock()?;
        let record = tables
            .requests
            .get_mut(&update.request_id)
            .ok_or(RepositoryError::NotFound)?;

        record.status = update.status.as_str().to_string();
        if let Some(notes) = update.admin_notes {
            record.admin_notes = non_blank(Some(notes));
        }
        Ok(record.clone())
    }

    async fn list(&self, filter: RequestFilter) -> Result<Vec<RequestRecord>, RepositoryError> {
        let tables = self.lock()?;
        let mut records: Vec<RequestRecord> = tables
            .requests
            .values()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn files_for(&self, id: &RequestId) -> Result<Vec<UploadedFile>, RepositoryError> {
        let tables = self.lock()?;
        Ok(tables
            .files
            .iter()
            .filter(|file| file.request_id == *id)
            .cloned()
            .collect())
    }
}

#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Bucket kept in memory. An optional object ceiling mimics the provider's payload
/// limit.
#[derive(Default, Clone)]
pub struct InMemoryObjectStorage {
    objects: Arc<Mutex<HashMap<String, StoredBlob>>>,
    max_object_bytes: Option<u64>,
}

impl InMemoryObjectStorage {
    pub fn with_object_limit(limit_bytes: u64) -> Self {
        Self {
            objects: Arc::default(),
            max_object_bytes: Some(limit_bytes),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, StoredBlob>>, StorageError> {
        self.objects
            .lock()
            .map_err(|_| StorageError::Unavailable("object store lock poisoned".to_string()))
    }

    pub fn get(&self, path: &StoragePath) -> Option<StoredBlob> {
        self.lock()
            .ok()
            .and_then(|objects| objects.get(&path.to_string()).cloned())
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .lock()
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ObjectStorage for InMemoryObjectStorage {
    async fn put(
        &self,
        path: &StoragePath,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<StoredObject, StorageError> {
        let size_bytes = bytes.len() as u64;
        if let Some(limit_bytes) = self.max_object_bytes {
            if size_bytes > limit_bytes {
                return Err(StorageError::PayloadTooLarge { limit_bytes });
            }
        }

        self.lock()?.insert(
            path.to_string(),
            StoredBlob {
                content_type: content_type.to_string(),
                bytes,
            },
        );
        Ok(StoredObject {
            path: path.clone(),
            size_bytes,
        })
    }

    async fn remove(&self, path: &StoragePath) -> Result<(), StorageError> {
        self.lock()?.remove(&path.to_string());
        Ok(())
    }
}
