use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::config::{BackendConfig, UploadConfig};

use super::attachments::{self, ValidationError};
use super::domain::{
    ApplicantDetails, Attachment, NewRequest, NewUploadedFile, RequestId, RequestNumber,
    RequestRecord, RequestSubmission, ServiceType, StatusUpdate, SubmissionReceipt,
    TrackedRequest, UploadedFile,
};
use super::repository::{
    CreatedWindow, ObjectStorage, RepositoryError, RequestFilter, RequestRepository, StorageError,
    StoragePath,
};
use super::session::Session;
use super::status::{Locale, RequestStatus};

/// Service composing the request store, the object store and the upload policy.
pub struct RequestService<R, S> {
    repository: Arc<R>,
    storage: Arc<S>,
    uploads: UploadConfig,
    backend: BackendConfig,
}

impl<R, S> RequestService<R, S>
where
    R: RequestRepository + 'static,
    S: ObjectStorage + 'static,
{
    pub fn new(
        repository: Arc<R>,
        storage: Arc<S>,
        uploads: UploadConfig,
        backend: BackendConfig,
    ) -> Self {
        Self {
            repository,
            storage,
            uploads,
            backend,
        }
    }

    pub fn locale(&self) -> Locale {
        self.backend.locale
    }

    pub fn upload_policy(&self) -> &UploadConfig {
        &self.uploads
    }

    /// File a new request and upload its attachments one after another.
    pub async fn submit(
        &self,
        session: Option<&Session>,
        submission: RequestSubmission,
    ) -> Result<SubmissionReceipt, RequestServiceError> {
        self.submit_at(session, submission, Utc::now()).await
    }

    /// Same as [`submit`](Self::submit) with an explicit clock reading.
    ///
    /// The first failing attachment stops the batch. The request row and the files
    /// stored before the failure are kept; the error carries the request number so
    /// the applicant can follow up.
    pub async fn submit_at(
        &self,
        session: Option<&Session>,
        submission: RequestSubmission,
        now: DateTime<Utc>,
    ) -> Result<SubmissionReceipt, RequestServiceError> {
        let session = session.ok_or(RequestServiceError::AuthRequired)?;
        let RequestSubmission {
            service_type,
            applicant,
            attachments: uploads,
        } = submission;

        let attachments = attachments::arrange(uploads).map_err(|(file_name, source)| {
            RequestServiceError::Validation {
                file_name,
                request_number: None,
                source,
            }
        })?;

        let record = self
            .create_request(session, service_type, applicant.normalized(), now)
            .await?;

        info!(
            request_number = %record.request_number,
            request_id = %record.id,
            service_type = %service_type,
            attachments = attachments.len(),
            "request created"
        );

        let mut files = Vec::with_capacity(attachments.len());
        for attachment in attachments {
            match self.attach(session, &record, attachment).await {
                Ok(file) => files.push(file),
                Err(err) => {
                    warn!(
                        request_number = %record.request_number,
                        stored_files = files.len(),
                        error = %err,
                        "submission stopped after attachment failure"
                    );
                    return Err(err);
                }
            }
        }

        Ok(SubmissionReceipt {
            request_id: record.id,
            request_number: record.request_number,
            submission_date: record.submission_date,
            status: RequestStatus::Submitted,
            files,
        })
    }

    async fn create_request(
        &self,
        session: &Session,
        service_type: ServiceType,
        applicant: ApplicantDetails,
        now: DateTime<Utc>,
    ) -> Result<RequestRecord, RequestServiceError> {
        let attempts = self.backend.request_number_attempts.max(1);

        for attempt in 1..=attempts {
            let request_number = draw_request_number(now.year());
            let request = NewRequest {
                owner_id: session.owner_id().clone(),
                service_type,
                request_number: request_number.clone(),
                submission_date: now.date_naive(),
                applicant: applicant.clone(),
                created_at: now,
            };

            match timeout(self.backend.timeout, self.repository.insert_request(request)).await {
                Ok(Ok(record)) => return Ok(record),
                Ok(Err(RepositoryError::Conflict)) => {
                    warn!(%request_number, attempt, "request number already taken");
                }
                Ok(Err(err)) => return Err(self.repository_failure("insert request", err)),
                Err(_) => return Err(self.timed_out("insert request")),
            }
        }

        error!(attempts, "no free request number");
        Err(RequestServiceError::Unexpected(format!(
            "no free request number after {attempts} attempts"
        )))
    }

    async fn attach(
        &self,
        session: &Session,
        record: &RequestRecord,
        attachment: Attachment,
    ) -> Result<UploadedFile, RequestServiceError> {
        let size_bytes = attachment.size_bytes();
        let request_number = &record.request_number;

        if let Err(source) = attachments::validate(&self.uploads, record.service_type, &attachment)
        {
            return Err(RequestServiceError::Validation {
                file_name: attachment.file_name,
                request_number: Some(request_number.clone()),
                source,
            });
        }

        let Attachment {
            file_type,
            file_name,
            content_type,
            bytes,
        } = attachment;
        let Some(path) = StoragePath::for_attachment(
            &self.backend.bucket,
            session.owner_id(),
            &record.id,
            file_type,
            &file_name,
        ) else {
            return Err(RequestServiceError::Validation {
                file_name: file_name.clone(),
                request_number: Some(request_number.clone()),
                source: ValidationError::InvalidFileName(file_name),
            });
        };

        let upload_failed = |reason: String| RequestServiceError::UploadFailure {
            file_name: file_name.clone(),
            size_bytes,
            request_number: request_number.clone(),
            reason,
        };

        debug!(path = %path, size_bytes, "uploading attachment");
        match timeout(
            self.backend.timeout,
            self.storage.put(&path, bytes, &content_type),
        )
        .await
        {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => {
                error!(path = %path, size_bytes, error = %err, "attachment upload failed");
                return Err(upload_failed(err.to_string()));
            }
            Err(_) => {
                error!(path = %path, size_bytes, "attachment upload timed out");
                return Err(upload_failed(format!(
                    "storage did not answer within {}ms",
                    self.backend.timeout.as_millis()
                )));
            }
        }

        let metadata = NewUploadedFile {
            request_id: record.id,
            file_type,
            file_path: path.key().to_string(),
            file_name: file_name.clone(),
            content_type,
            size_bytes,
        };
        let reason = match timeout(self.backend.timeout, self.repository.insert_file(metadata)).await
        {
            Ok(Ok(file)) => return Ok(file),
            Ok(Err(err)) => format!("file record not saved: {err}"),
            Err(_) => format!(
                "file record not saved within {}ms",
                self.backend.timeout.as_millis()
            ),
        };

        // Compensate so the bucket does not keep an object no row points to.
        error!(path = %path, reason = %reason, "removing object without file record");
        if let Err(err) = self.remove_object(&path).await {
            warn!(path = %path, error = %err, "stored object left behind");
        }
        Err(upload_failed(reason))
    }

    async fn remove_object(&self, path: &StoragePath) -> Result<(), StorageError> {
        match timeout(self.backend.timeout, self.storage.remove(path)).await {
            Ok(result) => result,
            Err(_) => Err(StorageError::Unavailable("remove timed out".to_string())),
        }
    }

    /// Public lookup by request number and the day it was filed.
    ///
    /// Wrong number and wrong date both answer `NotFound`.
    pub async fn track(
        &self,
        request_number: &str,
        submission_date: NaiveDate,
        locale: Locale,
    ) -> Result<TrackedRequest, RequestServiceError> {
        let Ok(number) = RequestNumber::parse(request_number) else {
            debug!(request_number, "malformed request number");
            return Err(RequestServiceError::NotFound);
        };

        let window = CreatedWindow::for_day(submission_date);
        let record = self
            .query(
                "find request by number",
                self.repository.find_by_number(&number, window),
            )
            .await?
            .ok_or(RequestServiceError::NotFound)?;

        Ok(record.tracking_view(locale))
    }

    /// Requests filed by the caller, newest first.
    pub async fn my_requests(
        &self,
        session: Option<&Session>,
        locale: Locale,
    ) -> Result<Vec<TrackedRequest>, RequestServiceError> {
        let session = session.ok_or(RequestServiceError::AuthRequired)?;
        let filter = RequestFilter {
            owner_id: Some(session.owner_id().clone()),
            status: None,
        };
        let records = self.query("list own requests", self.repository.list(filter)).await?;
        Ok(records
            .iter()
            .map(|record| record.tracking_view(locale))
            .collect())
    }

    /// Back-office listing, optionally narrowed to one status.
    pub async fn list_requests(
        &self,
        session: Option<&Session>,
        status: Option<RequestStatus>,
    ) -> Result<Vec<RequestRecord>, RequestServiceError> {
        require_admin(session)?;
        let filter = RequestFilter {
            owner_id: None,
            status,
        };
        self.query("list requests", self.repository.list(filter)).await
    }

    /// Sets status and notes. Any status may follow any other.
    pub async fn update_status(
        &self,
        session: Option<&Session>,
        request_id: &RequestId,
        status: RequestStatus,
        admin_notes: Option<String>,
    ) -> Result<RequestRecord, RequestServiceError> {
        let admin = require_admin(session)?;
        let previous = self
            .query("fetch request", self.repository.fetch(request_id))
            .await?
            .ok_or(RequestServiceError::NotFound)?;

        let update = StatusUpdate {
            request_id: *request_id,
            status,
            admin_notes,
        };
        let updated = self
            .query("update request status", self.repository.update_status(update))
            .await?;

        info!(
            request_number = %updated.request_number,
            from = %previous.status,
            to = %updated.status,
            admin = %admin.owner_id(),
            "request status changed"
        );
        Ok(updated)
    }

    /// Attachments of one request, visible to its owner and to administrators.
    pub async fn request_files(
        &self,
        session: Option<&Session>,
        request_id: &RequestId,
    ) -> Result<Vec<UploadedFile>, RequestServiceError> {
        let session = session.ok_or(RequestServiceError::AuthRequired)?;
        let record = self
            .query("fetch request", self.repository.fetch(request_id))
            .await?
            .ok_or(RequestServiceError::NotFound)?;

        if !session.is_admin() && record.owner_id != *session.owner_id() {
            return Err(RequestServiceError::NotFound);
        }

        self.query("list request files", self.repository.files_for(request_id))
            .await
    }

    async fn query<T, F>(&self, operation: &'static str, call: F) -> Result<T, RequestServiceError>
    where
        F: Future<Output = Result<T, RepositoryError>>,
    {
        match timeout(self.backend.timeout, call).await {
            Ok(result) => result.map_err(|err| self.repository_failure(operation, err)),
            Err(_) => Err(self.timed_out(operation)),
        }
    }

    fn repository_failure(&self, operation: &'static str, err: RepositoryError) -> RequestServiceError {
        match err {
            RepositoryError::NotFound => RequestServiceError::NotFound,
            other => {
                error!(operation, error = %other, "backend call failed");
                RequestServiceError::Unexpected(format!("{operation}: {other}"))
            }
        }
    }

    fn timed_out(&self, operation: &'static str) -> RequestServiceError {
        let timeout_ms = self.backend.timeout.as_millis();
        error!(operation, timeout_ms, "backend call timed out");
        RequestServiceError::Unexpected(format!("{operation}: no answer within {timeout_ms}ms"))
    }
}

fn draw_request_number(year: i32) -> RequestNumber {
    RequestNumber::generate(year, &mut rand::thread_rng())
}

fn require_admin(session: Option<&Session>) -> Result<&Session, RequestServiceError> {
    let session = session.ok_or(RequestServiceError::AuthRequired)?;
    if session.is_admin() {
        Ok(session)
    } else {
        Err(RequestServiceError::Forbidden)
    }
}

/// Error raised by the request service.
#[derive(Debug, thiserror::Error)]
pub enum RequestServiceError {
    #[error("sign in to continue")]
    AuthRequired,
    #[error("administrator access required")]
    Forbidden,
    #[error("{file_name}: {source}")]
    Validation {
        file_name: String,
        /// Set when the request row already exists.
        request_number: Option<RequestNumber>,
        source: ValidationError,
    },
    #[error("upload of {file_name} ({size_bytes} bytes) failed: {reason}")]
    UploadFailure {
        file_name: String,
        size_bytes: u64,
        request_number: RequestNumber,
        reason: String,
    },
    #[error("no such request")]
    NotFound,
    #[error("unexpected backend failure: {0}")]
    Unexpected(String),
}

impl RequestServiceError {
    /// Number of the request left behind by a partial submission.
    pub fn request_number(&self) -> Option<&RequestNumber> {
        match self {
            Self::Validation { request_number, .. } => request_number.as_ref(),
            Self::UploadFailure { request_number, .. } => Some(request_number),
            _ => None,
        }
    }
}
