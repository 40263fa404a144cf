use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use time::Date;
use validator::Validate;

/// Doctor shown in the staff pickers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffOption {
    pub staff_id: i64,
    pub full_name: String,
    pub position: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShiftType {
    #[default]
    Morning,
    Afternoon,
}

impl ShiftType {
    pub fn label(self) -> &'static str {
        match self {
            ShiftType::Morning => "Morning",
            ShiftType::Afternoon => "Afternoon",
        }
    }

    /// Working hours covered by the shift (four one-hour slots).
    pub fn hours(self) -> &'static str {
        match self {
            ShiftType::Morning => "08:00 - 12:00",
            ShiftType::Afternoon => "13:00 - 17:00",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ShiftType::Morning => "MORNING",
            ShiftType::Afternoon => "AFTERNOON",
        }
    }
}

impl fmt::Display for ShiftType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label(), self.hours())
    }
}

/// How the server resolves a date that already holds a shift for the same
/// staff member and shift type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictAction {
    /// Keep existing assignments; only write the free dates.
    #[default]
    Skip,
    /// Replace existing assignments on conflicting dates.
    Overwrite,
    /// Abort the whole batch if any date conflicts.
    Cancel,
}

impl ConflictAction {
    pub const ALL: [ConflictAction; 3] = [
        ConflictAction::Skip,
        ConflictAction::Overwrite,
        ConflictAction::Cancel,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ConflictAction::Skip => "Skip",
            ConflictAction::Overwrite => "Overwrite",
            ConflictAction::Cancel => "Cancel",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ConflictAction::Skip => "Keep existing schedule, only add new dates",
            ConflictAction::Overwrite => "Replace existing schedule",
            ConflictAction::Cancel => "Stop if any conflict found",
        }
    }
}

impl fmt::Display for ConflictAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.label(), self.description())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ShiftAssignmentRequest {
    #[validate(range(min = 1, message = "a doctor must be selected"))]
    pub staff_id: i64,
    pub date: Date,
    pub shift_type: ShiftType,
    pub conflict_action: ConflictAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BulkShiftAssignmentRequest {
    #[validate(range(min = 1, message = "a doctor must be selected"))]
    pub staff_id: i64,
    #[validate(length(min = 1, message = "at least one date must be selected"))]
    pub dates: Vec<Date>,
    pub shift_type: ShiftType,
    pub conflict_action: ConflictAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecurringScheduleRequest {
    #[validate(range(min = 1, message = "a doctor must be selected"))]
    pub staff_id: i64,
    #[validate(range(min = 2000, max = 9999))]
    pub year: i32,
    #[validate(range(min = 1, max = 12))]
    pub month: u8,
    /// ISO weekday, 1 = Monday .. 7 = Sunday.
    #[validate(range(min = 1, max = 7))]
    pub day_of_week: u8,
    pub shift_type: ShiftType,
    pub conflict_action: ConflictAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CopyScheduleRequest {
    #[validate(range(min = 1, max = 12))]
    pub source_month: u8,
    pub source_year: i32,
    #[validate(range(min = 1, max = 12))]
    pub target_month: u8,
    pub target_year: i32,
    /// `None` copies every doctor's schedule; the key is left out of the body.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1))]
    pub staff_id: Option<i64>,
    pub conflict_action: ConflictAction,
}

/// A per-date clash reported by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictInfo {
    pub date: String,
    pub staff_id: i64,
    #[serde(default)]
    pub staff_name: Option<String>,
    #[serde(default)]
    pub shift_type: Option<String>,
    #[serde(default)]
    pub existing_shift_info: String,
}

/// Terminal result of any schedule write.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BulkOperationResponse {
    pub success: bool,
    pub success_count: u32,
    pub skipped_count: u32,
    pub error_count: u32,
    pub conflicts: Vec<ConflictInfo>,
    pub created_dates: Vec<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffColorMapping {
    pub staff_id: i64,
    pub staff_name: String,
    pub color: String,
}

/// One doctor's shift on one calendar day, as summarised for the month view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayScheduleSummary {
    pub staff_id: i64,
    pub staff_name: String,
    #[serde(default)]
    pub staff_color: String,
    pub shift_type: String,
    #[serde(default)]
    pub slot_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyScheduleResponse {
    pub month: u8,
    pub year: i32,
    #[serde(default)]
    pub current_month: bool,
    #[serde(default)]
    pub past_month: bool,
    #[serde(default)]
    pub total_shifts: u32,
    #[serde(default)]
    pub has_previous_month_schedule: bool,
    #[serde(default)]
    pub staff_colors: Vec<StaffColorMapping>,
    /// Keyed by day of month (1..=31).
    #[serde(default)]
    pub schedule_by_day: BTreeMap<u8, Vec<DayScheduleSummary>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleStatus {
    Available,
    Booked,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlotRef {
    pub staff_schedule_id: i64,
}

/// A shift is four one-hour slots for the same doctor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftResponse {
    pub staff_id: i64,
    pub staff_name: String,
    #[serde(default)]
    pub staff_position: String,
    pub schedule_date: Date,
    pub shift_type: ShiftType,
    pub start_time: String,
    pub end_time: String,
    pub status: ScheduleStatus,
    #[serde(default)]
    pub time_slots: Vec<TimeSlotRef>,
    #[serde(default)]
    pub total_slots_count: u32,
    #[serde(default)]
    pub booked_slots_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyScheduleResponse {
    pub date: Date,
    #[serde(default)]
    pub past_date: bool,
    #[serde(default)]
    pub today: bool,
    #[serde(default)]
    pub day_of_week: u8,
    #[serde(default)]
    pub day_of_week_name: String,
    #[serde(default)]
    pub shifts: Vec<ShiftResponse>,
    #[serde(default)]
    pub total_shifts: u32,
}
