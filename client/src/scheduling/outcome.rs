//! Reading a `BulkOperationResponse` back to the user.
//!
//! Classification looks only at the counts; the banner repeats the server's
//! message and conflicts verbatim.

use std::fmt;

use crate::models::schedule::{BulkOperationResponse, ConflictInfo};

/// Conflicts listed in a banner before collapsing into "... and N more".
pub const MAX_LISTED_CONFLICTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Succeeded,
    Partial,
    Failed,
}

impl Classification {
    pub fn of(resp: &BulkOperationResponse) -> Self {
        if resp.error_count == 0 {
            Classification::Succeeded
        } else if resp.success_count > 0 {
            Classification::Partial
        } else {
            Classification::Failed
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            Classification::Succeeded => Severity::Success,
            Classification::Partial => Severity::Warning,
            Classification::Failed => Severity::Error,
        }
    }
}

impl BulkOperationResponse {
    pub fn classify(&self) -> Classification {
        Classification::of(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Warning,
    Info,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Info => "info",
            Severity::Error => "error",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    pub severity: Severity,
    pub message: String,
    pub details: Vec<String>,
    pub conflicts: Vec<String>,
    pub hidden_conflicts: usize,
}

impl Banner {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            details: Vec::new(),
            conflicts: Vec::new(),
            hidden_conflicts: 0,
        }
    }

    pub fn from_response(resp: &BulkOperationResponse) -> Self {
        let mut details = vec![
            format!("Created: {} slots", resp.success_count),
            format!("Skipped: {} slots", resp.skipped_count),
        ];
        if resp.error_count > 0 {
            details.push(format!("Errors: {}", resp.error_count));
        }

        // nothing failed, but nothing new was written either
        let severity = match resp.classify() {
            Classification::Succeeded if resp.success_count == 0 => Severity::Info,
            other => other.severity(),
        };

        Self {
            severity,
            message: resp.message.clone(),
            details,
            conflicts: resp
                .conflicts
                .iter()
                .take(MAX_LISTED_CONFLICTS)
                .map(conflict_line)
                .collect(),
            hidden_conflicts: resp.conflicts.len().saturating_sub(MAX_LISTED_CONFLICTS),
        }
    }
}

fn conflict_line(c: &ConflictInfo) -> String {
    let who = match &c.staff_name {
        Some(name) => name.clone(),
        None => format!("Staff {}", c.staff_id),
    };
    if c.existing_shift_info.is_empty() {
        format!("{} - {}", who, c.date)
    } else {
        format!("{} - {}: {}", who, c.date, c.existing_shift_info)
    }
}

impl fmt::Display for Banner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.message)?;
        for line in &self.details {
            write!(f, "\n  {line}")?;
        }
        if !self.conflicts.is_empty() {
            write!(f, "\n  Conflicts:")?;
            for line in &self.conflicts {
                write!(f, "\n    • {line}")?;
            }
            if self.hidden_conflicts > 0 {
                write!(f, "\n    ... and {} more", self.hidden_conflicts)?;
            }
        }
        Ok(())
    }
}
