use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use super::common::*;
use crate::workflows::requests::attachments::ValidationError;
use crate::workflows::requests::domain::{FileType, ServiceType};
use crate::workflows::requests::memory::{InMemoryObjectStorage, InMemoryRequestStore};
use crate::workflows::requests::repository::RequestRepository;
use crate::workflows::requests::status::{Locale, RequestStatus};
use crate::workflows::requests::timeline::StageDate;
use crate::workflows::requests::RequestServiceError;

fn filed_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 14, 9, 30, 0)
        .single()
        .expect("valid timestamp")
}

#[tokio::test]
async fn passport_renewal_with_one_pdf_creates_request_and_file() {
    let (service, store, storage) = build_service();
    let session = student();

    let receipt = service
        .submit_at(Some(&session), passport_renewal(), filed_at())
        .await
        .expect("submission succeeds");

    assert_eq!(store.request_count(), 1);
    assert_eq!(store.file_count(), 1);
    assert_eq!(receipt.status, RequestStatus::Submitted);
    assert_eq!(receipt.submission_date, filed_at().date_naive());
    assert!(receipt.request_number.as_str().starts_with("REQ-2025-"));

    let file = &receipt.files[0];
    assert_eq!(file.file_type, FileType::Passport);
    assert_eq!(file.size_bytes, (2 * MIB) as u64);
    assert_eq!(
        file.file_path,
        format!("student-1/{}/passport/passport.pdf", receipt.request_id)
    );
    assert_eq!(storage.keys(), vec![format!("request-files/{}", file.file_path)]);

    let stored = store
        .fetch(&receipt.request_id)
        .await
        .expect("fetch")
        .expect("record present");
    assert_eq!(stored.status, "submitted");
    assert_eq!(stored.applicant.first_name, "Amal");
    assert_eq!(stored.applicant.major, None);
}

#[tokio::test]
async fn oversized_second_file_stops_the_batch_after_the_first() {
    let (service, store, _storage) = build_service();
    let session = student();
    let oversized = 6 * MIB;

    let result = service
        .submit(
            Some(&session),
            submission(
                ServiceType::UniversityAdmission,
                vec![
                    pdf(FileType::Certificate, "certificate.pdf", oversized),
                    pdf(FileType::Passport, "passport.pdf", MIB),
                ],
            ),
        )
        .await;

    let err = result.expect_err("second attachment is too large");
    match &err {
        RequestServiceError::Validation {
            file_name,
            request_number,
            source: ValidationError::TooLarge { size_bytes, .. },
        } => {
            assert_eq!(file_name, "certificate.pdf");
            assert_eq!(*size_bytes, oversized as u64);
            assert!(request_number.is_some());
        }
        other => panic!("expected size validation failure, got {other:?}"),
    }
    let message = err.to_string();
    assert!(message.contains("certificate.pdf"));
    assert!(message.contains(&oversized.to_string()));

    assert_eq!(store.request_count(), 1);
    assert_eq!(store.file_count(), 1);
}

#[tokio::test]
async fn storage_payload_rejection_reports_upload_failure() {
    let store = Arc::new(InMemoryRequestStore::default());
    let storage = Arc::new(InMemoryObjectStorage::with_object_limit(MIB as u64));
    let service = service_with(store.clone(), storage.clone());

    let err = service
        .submit(Some(&student()), passport_renewal())
        .await
        .expect_err("storage refuses the object");

    match err {
        RequestServiceError::UploadFailure {
            file_name,
            size_bytes,
            reason,
            ..
        } => {
            assert_eq!(file_name, "passport.pdf");
            assert_eq!(size_bytes, (2 * MIB) as u64);
            assert!(reason.contains("larger than"));
        }
        other => panic!("expected upload failure, got {other:?}"),
    }
    assert_eq!(store.request_count(), 1);
    assert_eq!(store.file_count(), 0);
}

#[tokio::test]
async fn submit_without_session_requires_auth() {
    let (service, store, storage) = build_service();

    let result = service.submit(None, passport_renewal()).await;

    assert!(matches!(result, Err(RequestServiceError::AuthRequired)));
    assert_eq!(store.request_count(), 0);
    assert!(storage.keys().is_empty());
}

#[tokio::test]
async fn duplicate_slot_is_refused_before_any_write() {
    let (service, store, _storage) = build_service();

    let result = service
        .submit(
            Some(&student()),
            submission(
                ServiceType::PassportRenewal,
                vec![
                    pdf(FileType::Passport, "front.pdf", 10),
                    pdf(FileType::Passport, "back.pdf", 10),
                ],
            ),
        )
        .await;

    match result {
        Err(RequestServiceError::Validation {
            request_number: None,
            source: ValidationError::DuplicateSlot(FileType::Passport),
            ..
        }) => {}
        other => panic!("expected duplicate slot failure, got {other:?}"),
    }
    assert_eq!(store.request_count(), 0);
}

#[tokio::test]
async fn slot_outside_the_service_keeps_the_request_row() {
    let (service, store, _storage) = build_service();

    let result = service
        .submit(
            Some(&student()),
            submission(
                ServiceType::PassportRenewal,
                vec![pdf(FileType::Certificate, "degree.pdf", 10)],
            ),
        )
        .await;

    match result {
        Err(RequestServiceError::Validation {
            request_number: Some(_),
            source: ValidationError::SlotNotAccepted { .. },
            ..
        }) => {}
        other => panic!("expected slot failure, got {other:?}"),
    }
    assert_eq!(store.request_count(), 1);
    assert_eq!(store.file_count(), 0);
}

#[tokio::test]
async fn disallowed_mime_type_is_rejected() {
    let (service, _store, storage) = build_service();
    let mut attachment = pdf(FileType::Passport, "passport.exe", 10);
    attachment.content_type = "application/x-msdownload".to_string();

    let result = service
        .submit(
            Some(&student()),
            submission(ServiceType::PassportRenewal, vec![attachment]),
        )
        .await;

    assert!(matches!(
        result,
        Err(RequestServiceError::Validation {
            source: ValidationError::MimeTypeNotAllowed { .. },
            ..
        })
    ));
    assert!(storage.keys().is_empty());
}

#[tokio::test]
async fn lookup_requires_matching_number_and_date() {
    let (service, _store, _storage) = build_service();
    let receipt = service
        .submit_at(Some(&student()), passport_renewal(), filed_at())
        .await
        .expect("submission succeeds");
    let number = receipt.request_number.as_str().to_ascii_lowercase();

    let tracked = service
        .track(&format!("  {number} "), filed_at().date_naive(), Locale::English)
        .await
        .expect("found on the filing day");
    assert_eq!(tracked.request.request_id, receipt.request_id);
    assert_eq!(tracked.request.status_label, "Submitted");
    assert_eq!(
        tracked.timeline[0].stage_date,
        StageDate::Created(filed_at().date_naive())
    );
    assert_eq!(tracked.timeline[0].date, "2025-03-14");

    let next_day = (filed_at() + Duration::days(1)).date_naive();
    assert!(matches!(
        service.track(&number, next_day, Locale::English).await,
        Err(RequestServiceError::NotFound)
    ));
    assert!(matches!(
        service
            .track("not-a-number", filed_at().date_naive(), Locale::English)
            .await,
        Err(RequestServiceError::NotFound)
    ));
}

#[tokio::test]
async fn rejected_request_timeline_marks_skipped_stages() {
    let (service, _store, _storage) = build_service();
    let admin = admin();
    let receipt = service
        .submit_at(Some(&student()), passport_renewal(), filed_at())
        .await
        .expect("submission succeeds");

    let updated = service
        .update_status(
            Some(&admin),
            &receipt.request_id,
            RequestStatus::Rejected,
            Some("Passport copy unreadable".to_string()),
        )
        .await
        .expect("admin may reject");
    assert_eq!(updated.status, "rejected");

    let tracked = service
        .track(
            receipt.request_number.as_str(),
            filed_at().date_naive(),
            Locale::English,
        )
        .await
        .expect("tracked");
    let completion: Vec<bool> = tracked.timeline.iter().map(|entry| entry.complete).collect();
    assert_eq!(completion, vec![true, false, false, false, true]);
    assert_eq!(tracked.timeline[2].stage_date, StageDate::Rejected);
    assert_eq!(
        tracked.request.admin_notes.as_deref(),
        Some("Passport copy unreadable")
    );
}

#[tokio::test]
async fn failed_file_row_removes_the_stored_object() {
    let repository = Arc::new(FileRowFailureRepository::default());
    let storage = Arc::new(InMemoryObjectStorage::default());
    let service = service_with(repository.clone(), storage.clone());

    let err = service
        .submit(Some(&student()), passport_renewal())
        .await
        .expect_err("file row cannot be written");

    assert!(matches!(err, RequestServiceError::UploadFailure { .. }));
    assert!(err.request_number().is_some());
    assert!(storage.keys().is_empty());
    assert_eq!(repository.inner.request_count(), 1);
}

#[tokio::test]
async fn taken_request_numbers_are_redrawn() {
    let repository = Arc::new(ConflictingRepository::new(2));
    let service = service_with(repository.clone(), Arc::new(InMemoryObjectStorage::default()));

    service
        .submit(Some(&student()), passport_renewal())
        .await
        .expect("third draw succeeds");
    assert_eq!(repository.attempts(), 3);
    assert_eq!(repository.inner.request_count(), 1);
}

#[tokio::test]
async fn exhausted_request_numbers_fail_unexpectedly() {
    let repository = Arc::new(ConflictingRepository::new(usize::MAX));
    let service = service_with(repository.clone(), Arc::new(InMemoryObjectStorage::default()));

    let result = service.submit(Some(&student()), passport_renewal()).await;

    assert!(matches!(result, Err(RequestServiceError::Unexpected(_))));
    assert_eq!(
        repository.attempts(),
        usize::from(backend().request_number_attempts)
    );
}

#[tokio::test]
async fn stalled_storage_times_out_as_upload_failure() {
    let store = Arc::new(InMemoryRequestStore::default());
    let service = service_with(store.clone(), Arc::new(StalledStorage));

    let err = service
        .submit(Some(&student()), passport_renewal())
        .await
        .expect_err("storage never answers");

    match err {
        RequestServiceError::UploadFailure { reason, .. } => {
            assert!(reason.contains("did not answer"));
        }
        other => panic!("expected upload failure, got {other:?}"),
    }
    assert_eq!(store.file_count(), 0);
}

#[tokio::test]
async fn unavailable_backend_surfaces_as_unexpected() {
    let service = service_with(
        Arc::new(UnavailableRepository),
        Arc::new(InMemoryObjectStorage::default()),
    );

    assert!(matches!(
        service.submit(Some(&student()), passport_renewal()).await,
        Err(RequestServiceError::Unexpected(_))
    ));
    assert!(matches!(
        service
            .track("REQ-2025-0001", filed_at().date_naive(), Locale::English)
            .await,
        Err(RequestServiceError::Unexpected(_))
    ));
}

#[tokio::test]
async fn back_office_requires_admin_role() {
    let (service, _store, _storage) = build_service();
    let session = student();
    let receipt = service
        .submit(Some(&session), passport_renewal())
        .await
        .expect("submission succeeds");

    assert!(matches!(
        service.list_requests(Some(&session), None).await,
        Err(RequestServiceError::Forbidden)
    ));
    assert!(matches!(
        service.list_requests(None, None).await,
        Err(RequestServiceError::AuthRequired)
    ));
    assert!(matches!(
        service
            .update_status(
                Some(&session),
                &receipt.request_id,
                RequestStatus::Approved,
                None
            )
            .await,
        Err(RequestServiceError::Forbidden)
    ));
}

#[tokio::test]
async fn admin_listing_filters_by_status_and_keeps_notes() {
    let (service, _store, _storage) = build_service();
    let admin = admin();
    let first = service
        .submit(Some(&student()), passport_renewal())
        .await
        .expect("first");
    let second = service
        .submit(Some(&other_student()), passport_renewal())
        .await
        .expect("second");

    service
        .update_status(
            Some(&admin),
            &first.request_id,
            RequestStatus::UnderReview,
            Some("Checking documents".to_string()),
        )
        .await
        .expect("under review");
    let processing = service
        .update_status(Some(&admin), &first.request_id, RequestStatus::Processing, None)
        .await
        .expect("processing");
    assert_eq!(processing.admin_notes.as_deref(), Some("Checking documents"));

    let all = service.list_requests(Some(&admin), None).await.expect("all");
    assert_eq!(all.len(), 2);
    let processing_only = service
        .list_requests(Some(&admin), Some(RequestStatus::Processing))
        .await
        .expect("filtered");
    assert_eq!(processing_only.len(), 1);
    assert_eq!(processing_only[0].id, first.request_id);

    let submitted_only = service
        .list_requests(Some(&admin), Some(RequestStatus::Submitted))
        .await
        .expect("filtered");
    assert_eq!(submitted_only[0].id, second.request_id);
}

#[tokio::test]
async fn update_status_of_unknown_request_is_not_found() {
    let (service, _store, _storage) = build_service();

    let result = service
        .update_status(
            Some(&admin()),
            &crate::workflows::requests::RequestId::new(),
            RequestStatus::Approved,
            None,
        )
        .await;

    assert!(matches!(result, Err(RequestServiceError::NotFound)));
}

#[tokio::test]
async fn dashboard_lists_only_own_requests_newest_first() {
    let (service, _store, _storage) = build_service();
    let session = student();
    let older = service
        .submit_at(Some(&session), passport_renewal(), filed_at())
        .await
        .expect("older");
    let newer = service
        .submit_at(
            Some(&session),
            passport_renewal(),
            filed_at() + Duration::days(2),
        )
        .await
        .expect("newer");
    service
        .submit(Some(&other_student()), passport_renewal())
        .await
        .expect("someone else");

    let mine = service
        .my_requests(Some(&session), Locale::Arabic)
        .await
        .expect("dashboard");

    let ids: Vec<_> = mine.iter().map(|tracked| tracked.request.request_id).collect();
    assert_eq!(ids, vec![newer.request_id, older.request_id]);
    assert_eq!(mine[0].request.status_label, "تم التقديم");
    assert!(matches!(
        service.my_requests(None, Locale::English).await,
        Err(RequestServiceError::AuthRequired)
    ));
}

#[tokio::test]
async fn request_files_are_visible_to_owner_and_admin_only() {
    let (service, _store, _storage) = build_service();
    let owner = student();
    let receipt = service
        .submit(Some(&owner), passport_renewal())
        .await
        .expect("submission succeeds");

    let files = service
        .request_files(Some(&owner), &receipt.request_id)
        .await
        .expect("owner sees files");
    assert_eq!(files.len(), 1);

    let files = service
        .request_files(Some(&admin()), &receipt.request_id)
        .await
        .expect("admin sees files");
    assert_eq!(files.len(), 1);

    assert!(matches!(
        service
            .request_files(Some(&other_student()), &receipt.request_id)
            .await,
        Err(RequestServiceError::NotFound)
    ));
}
