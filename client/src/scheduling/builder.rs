//! Turns dialog selections into exactly one request body and endpoint.

use serde::Serialize;
use time::Date;
use validator::Validate;

use crate::{
    error::{ClientError, Result},
    models::schedule::{
        BulkShiftAssignmentRequest, ConflictAction, CopyScheduleRequest, RecurringScheduleRequest,
        ShiftAssignmentRequest, ShiftType,
    },
    scheduling::dates::{copy_source, month_from_number, recurring_dates, weekday_from_iso, DateSelection},
};

pub const ASSIGN_ENDPOINT: &str = "schedule/assign";
pub const BULK_ASSIGN_ENDPOINT: &str = "schedule/bulk-assign";
pub const RECURRING_ENDPOINT: &str = "schedule/recurring";
pub const COPY_ENDPOINT: &str = "schedule/copy-from-previous";

/// One ready-to-send schedule write.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ScheduleSubmission {
    Single(ShiftAssignmentRequest),
    Bulk(BulkShiftAssignmentRequest),
    Recurring(RecurringScheduleRequest),
    Copy(CopyScheduleRequest),
}

impl ScheduleSubmission {
    pub fn endpoint(&self) -> &'static str {
        match self {
            ScheduleSubmission::Single(_) => ASSIGN_ENDPOINT,
            ScheduleSubmission::Bulk(_) => BULK_ASSIGN_ENDPOINT,
            ScheduleSubmission::Recurring(_) => RECURRING_ENDPOINT,
            ScheduleSubmission::Copy(_) => COPY_ENDPOINT,
        }
    }

    pub fn conflict_action(&self) -> ConflictAction {
        match self {
            ScheduleSubmission::Single(r) => r.conflict_action,
            ScheduleSubmission::Bulk(r) => r.conflict_action,
            ScheduleSubmission::Recurring(r) => r.conflict_action,
            ScheduleSubmission::Copy(r) => r.conflict_action,
        }
    }
}

fn require_staff(staff_id: Option<i64>, message: &str) -> Result<i64> {
    staff_id.ok_or_else(|| ClientError::InvalidInput(message.into()))
}

/// Form state of the "Assign Shift" dialog.
#[derive(Debug, Clone, Default)]
pub struct AssignDraft {
    pub staff_id: Option<i64>,
    pub shift_type: ShiftType,
    pub conflict_action: ConflictAction,
    pub dates: DateSelection,
}

impl AssignDraft {
    pub fn can_submit(&self) -> bool {
        self.staff_id.is_some() && !self.dates.is_empty()
    }

    /// One date goes to the single-assign endpoint, several to bulk-assign.
    pub fn build(&self) -> Result<ScheduleSubmission> {
        let (staff_id, first) = match (self.staff_id, self.dates.first()) {
            (Some(id), Some(first)) => (id, first),
            _ => {
                return Err(ClientError::InvalidInput(
                    "Please select a doctor and at least one date".into(),
                ))
            }
        };

        let submission = if self.dates.len() == 1 {
            let req = ShiftAssignmentRequest {
                staff_id,
                date: first,
                shift_type: self.shift_type,
                conflict_action: self.conflict_action,
            };
            req.validate()?;
            ScheduleSubmission::Single(req)
        } else {
            let req = BulkShiftAssignmentRequest {
                staff_id,
                dates: self.dates.to_vec(),
                shift_type: self.shift_type,
                conflict_action: self.conflict_action,
            };
            req.validate()?;
            ScheduleSubmission::Bulk(req)
        };
        Ok(submission)
    }
}

/// Form state of the "Create Recurring Schedule" dialog.
#[derive(Debug, Clone)]
pub struct RecurringDraft {
    pub staff_id: Option<i64>,
    pub year: i32,
    pub month: u8,
    /// ISO weekday, 1 = Monday .. 7 = Sunday.
    pub day_of_week: u8,
    pub shift_type: ShiftType,
    pub conflict_action: ConflictAction,
}

impl RecurringDraft {
    pub fn new(year: i32, month: u8) -> Self {
        Self {
            staff_id: None,
            year,
            month,
            day_of_week: 1,
            shift_type: ShiftType::default(),
            conflict_action: ConflictAction::default(),
        }
    }

    /// Dates the server is expected to fill, for preview.
    pub fn preview(&self, today: Date) -> Result<Vec<Date>> {
        recurring_dates(self.year, self.month, self.day_of_week, today)
    }

    /// Fails with [`ClientError::EmptyRecurrence`] when every matching day is
    /// already past, so the caller can disable submission with an explanation.
    pub fn build(&self, today: Date) -> Result<ScheduleSubmission> {
        let staff_id = require_staff(self.staff_id, "Please select a doctor")?;
        if self.preview(today)?.is_empty() {
            return Err(ClientError::EmptyRecurrence {
                weekday: weekday_from_iso(self.day_of_week)?,
                month: month_from_number(self.month)?,
                year: self.year,
            });
        }

        let req = RecurringScheduleRequest {
            staff_id,
            year: self.year,
            month: self.month,
            day_of_week: self.day_of_week,
            shift_type: self.shift_type,
            conflict_action: self.conflict_action,
        };
        req.validate()?;
        Ok(ScheduleSubmission::Recurring(req))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StaffScope {
    #[default]
    All,
    One(i64),
}

/// Form state of the "Copy Schedule from Previous Month" dialog.
#[derive(Debug, Clone)]
pub struct CopyDraft {
    pub target_month: u8,
    pub target_year: i32,
    pub staff: StaffScope,
    pub conflict_action: ConflictAction,
}

impl CopyDraft {
    pub fn new(target_year: i32, target_month: u8) -> Self {
        Self {
            target_month,
            target_year,
            staff: StaffScope::All,
            conflict_action: ConflictAction::default(),
        }
    }

    pub fn build(&self) -> Result<ScheduleSubmission> {
        let source = copy_source(self.target_month, self.target_year)?;
        let req = CopyScheduleRequest {
            source_month: source.month,
            source_year: source.year,
            target_month: self.target_month,
            target_year: self.target_year,
            staff_id: match self.staff {
                StaffScope::All => None,
                StaffScope::One(id) => Some(id),
            },
            conflict_action: self.conflict_action,
        };
        req.validate()?;
        Ok(ScheduleSubmission::Copy(req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn draft_with(dates: &[Date]) -> AssignDraft {
        let today = date!(2025 - 07 - 01);
        let mut draft = AssignDraft {
            staff_id: Some(1),
            ..AssignDraft::default()
        };
        for d in dates {
            draft.dates.add(*d, today).unwrap();
        }
        draft
    }

    #[test]
    fn single_date_builds_single_assignment() {
        let sub = draft_with(&[date!(2025 - 07 - 10)]).build().unwrap();
        assert_eq!(sub.endpoint(), ASSIGN_ENDPOINT);

        let body = serde_json::to_value(&sub).unwrap();
        assert!(body.get("dates").is_none());
        assert_eq!(body["date"], "2025-07-10");
        assert_eq!(body["staffId"], 1);
    }

    #[test]
    fn several_dates_build_sorted_bulk_assignment() {
        let sub = draft_with(&[date!(2025 - 07 - 12), date!(2025 - 07 - 10)])
            .build()
            .unwrap();
        assert_eq!(sub.endpoint(), BULK_ASSIGN_ENDPOINT);

        let body = serde_json::to_value(&sub).unwrap();
        assert_eq!(body["dates"], serde_json::json!(["2025-07-10", "2025-07-12"]));
        assert_eq!(body["shiftType"], "MORNING");
        assert_eq!(body["conflictAction"], "SKIP");
    }

    #[test]
    fn missing_staff_or_dates_fails_fast() {
        let no_dates = AssignDraft {
            staff_id: Some(1),
            ..AssignDraft::default()
        };
        assert!(!no_dates.can_submit());
        assert!(matches!(no_dates.build(), Err(ClientError::InvalidInput(_))));

        let mut no_staff = draft_with(&[date!(2025 - 07 - 10)]);
        no_staff.staff_id = None;
        assert!(matches!(no_staff.build(), Err(ClientError::InvalidInput(_))));
    }

    #[test]
    fn non_positive_staff_id_is_rejected_by_validation() {
        let mut draft = draft_with(&[date!(2025 - 07 - 10)]);
        draft.staff_id = Some(0);
        assert!(matches!(draft.build(), Err(ClientError::Validation(_))));
    }

    #[test]
    fn conflict_action_passes_through_unmodified() {
        for action in ConflictAction::ALL {
            let mut draft = draft_with(&[date!(2025 - 07 - 10), date!(2025 - 07 - 11)]);
            draft.conflict_action = action;
            assert_eq!(draft.build().unwrap().conflict_action(), action);
        }
    }

    #[test]
    fn recurring_builds_iso_weekday_request() {
        let mut draft = RecurringDraft::new(2025, 6);
        draft.staff_id = Some(3);
        draft.day_of_week = 7;
        draft.shift_type = ShiftType::Afternoon;

        let sub = draft.build(date!(2025 - 06 - 15)).unwrap();
        assert_eq!(sub.endpoint(), RECURRING_ENDPOINT);
        assert_eq!(
            serde_json::to_value(&sub).unwrap(),
            serde_json::json!({
                "staffId": 3,
                "year": 2025,
                "month": 6,
                "dayOfWeek": 7,
                "shiftType": "AFTERNOON",
                "conflictAction": "SKIP",
            })
        );
    }

    #[test]
    fn recurring_wholly_in_past_is_empty_not_failure() {
        let mut draft = RecurringDraft::new(2025, 5);
        draft.staff_id = Some(3);
        assert!(draft.preview(date!(2025 - 06 - 15)).unwrap().is_empty());
        assert!(matches!(
            draft.build(date!(2025 - 06 - 15)),
            Err(ClientError::EmptyRecurrence { .. })
        ));
    }

    #[test]
    fn recurring_requires_staff() {
        let draft = RecurringDraft::new(2025, 6);
        assert!(matches!(
            draft.build(date!(2025 - 06 - 15)),
            Err(ClientError::InvalidInput(_))
        ));
    }

    #[test]
    fn copy_for_all_staff_omits_staff_id() {
        let sub = CopyDraft::new(2026, 1).build().unwrap();
        assert_eq!(sub.endpoint(), COPY_ENDPOINT);

        let body = serde_json::to_value(&sub).unwrap();
        assert!(body.get("staffId").is_none());
        assert_eq!(body["sourceMonth"], 12);
        assert_eq!(body["sourceYear"], 2025);
        assert_eq!(body["targetMonth"], 1);
        assert_eq!(body["targetYear"], 2026);
    }

    #[test]
    fn copy_for_one_doctor_sends_staff_id() {
        let mut draft = CopyDraft::new(2025, 6);
        draft.staff = StaffScope::One(9);
        draft.conflict_action = ConflictAction::Overwrite;

        let body = serde_json::to_value(draft.build().unwrap()).unwrap();
        assert_eq!(body["staffId"], 9);
        assert_eq!(body["sourceMonth"], 5);
        assert_eq!(body["conflictAction"], "OVERWRITE");
    }
}
