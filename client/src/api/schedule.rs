use async_trait::async_trait;
use futures::future::join_all;
use time::Date;

use crate::{
    api::ApiClient,
    error::{ClientError, Result},
    models::schedule::{
        BulkOperationResponse, DailyScheduleResponse, MonthlyScheduleResponse, ShiftResponse,
        StaffOption,
    },
    scheduling::{builder::ScheduleSubmission, dialog::ScheduleService},
};

impl ApiClient {
    pub async fn doctors(&self) -> Result<Vec<StaffOption>> {
        self.get("staff/doctors", &[]).await
    }

    pub async fn monthly_schedule(&self, year: i32, month: u8) -> Result<MonthlyScheduleResponse> {
        self.get(
            "schedule/monthly",
            &[("month", month.to_string()), ("year", year.to_string())],
        )
        .await
    }

    pub async fn daily_schedule(&self, date: Date) -> Result<DailyScheduleResponse> {
        self.get("schedule/daily", &[("date", date.to_string())]).await
    }

    pub async fn submit_schedule(&self, submission: &ScheduleSubmission) -> Result<BulkOperationResponse> {
        self.post(submission.endpoint(), submission).await
    }

    pub async fn delete_slot(&self, staff_schedule_id: i64) -> Result<()> {
        self.delete(&format!("schedule/slot/{staff_schedule_id}")).await
    }

    /// Deletes every slot of a shift concurrently.
    ///
    /// Waits for all deletes to settle and returns the first failure in slot
    /// order, or the number of slots removed.
    pub async fn delete_shift(&self, shift: &ShiftResponse) -> Result<usize> {
        if shift.time_slots.is_empty() {
            return Err(ClientError::InvalidInput("Shift has no time slots to delete".into()));
        }

        let results = join_all(
            shift
                .time_slots
                .iter()
                .map(|slot| self.delete_slot(slot.staff_schedule_id)),
        )
        .await;

        let total = results.len();
        let mut first_error = None;
        let mut failed = 0;
        for res in results {
            if let Err(e) = res {
                failed += 1;
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => {
                tracing::warn!(
                    staff_id = shift.staff_id,
                    date = %shift.schedule_date,
                    failed,
                    total,
                    "Shift deletion incomplete"
                );
                Err(e)
            }
            None => {
                tracing::info!(staff_id = shift.staff_id, date = %shift.schedule_date, total, "Shift deleted");
                Ok(total)
            }
        }
    }
}

#[async_trait]
impl ScheduleService for ApiClient {
    async fn submit(&self, submission: &ScheduleSubmission) -> Result<BulkOperationResponse> {
        self.submit_schedule(submission).await
    }
}
