//! Progress timeline derived from a request's current status.
//!
//! Only the creation timestamp is persisted, so every stage after `submitted` shows
//! a generic marker instead of the date it was reached.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use super::status::{Locale, RequestStatus};

/// What the date column of a stage shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum StageDate {
    Created(NaiveDate),
    Updated,
    Pending,
    Rejected,
}

impl StageDate {
    pub fn display(self, locale: Locale) -> String {
        match (self, locale) {
            (Self::Created(date), _) => date.format("%Y-%m-%d").to_string(),
            (Self::Updated, Locale::English) => "Updated".to_string(),
            (Self::Pending, Locale::English) => "Pending".to_string(),
            (Self::Rejected, Locale::English) => "Not reached (rejected)".to_string(),
            (Self::Updated, Locale::Arabic) => "تم التحديث".to_string(),
            (Self::Pending, Locale::Arabic) => "قيد الانتظار".to_string(),
            (Self::Rejected, Locale::Arabic) => "لم تتم (مرفوض)".to_string(),
        }
    }
}

/// One row of the rendered timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusDescriptor {
    pub status: RequestStatus,
    pub label: &'static str,
    pub stage_date: StageDate,
    pub date: String,
    pub complete: bool,
}

/// Maps a persisted status onto the five canonical stages, in canonical order.
///
/// An absent or unrecognised status renders as no progress at all. A rejected request
/// shows only `submitted` and `rejected` as reached: rejection can follow any state, so
/// the stages in between are never implied.
pub fn build_timeline(
    status: Option<&str>,
    created_at: DateTime<Utc>,
    locale: Locale,
) -> Vec<StatusDescriptor> {
    let current = status.and_then(RequestStatus::parse);
    let current_index = current.map(RequestStatus::position);
    let rejected = current == Some(RequestStatus::Rejected);

    RequestStatus::ordered()
        .into_iter()
        .enumerate()
        .map(|(index, stage)| {
            let reached = current_index.is_some_and(|current| index <= current);

            let (complete, stage_date) = match stage {
                RequestStatus::UnderReview | RequestStatus::Processing | RequestStatus::Approved
                    if rejected =>
                {
                    (false, StageDate::Rejected)
                }
                RequestStatus::Submitted if reached => {
                    (true, StageDate::Created(created_at.date_naive()))
                }
                _ if reached => (true, StageDate::Updated),
                _ => (false, StageDate::Pending),
            };

            StatusDescriptor {
                status: stage,
                label: stage.label(locale),
                stage_date,
                date: stage_date.display(locale),
                complete,
            }
        })
        .collect()
}
