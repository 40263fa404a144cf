use std::{collections::BTreeMap, fmt::Write as _};

use time::{Date, Month};

use crate::{
    error::{ClientError, Result},
    models::schedule::DayScheduleSummary,
    scheduling::dates::{first_of_month, is_past, month_from_number},
};

/// Entries drawn inside one day cell before "+N more".
pub const MAX_ENTRIES_PER_DAY: usize = 4;

pub const WEEKDAY_HEADERS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEntry {
    pub staff_id: i64,
    /// `S` morning, `C` afternoon, `F` full day.
    pub badge: &'static str,
    /// Last word of the staff member's name.
    pub short_name: String,
    pub color: String,
}

impl CalendarEntry {
    fn from_summary(s: &DayScheduleSummary) -> Self {
        Self {
            staff_id: s.staff_id,
            badge: shift_badge(&s.shift_type),
            short_name: s
                .staff_name
                .split_whitespace()
                .last()
                .unwrap_or_default()
                .to_string(),
            color: s.staff_color.clone(),
        }
    }
}

pub fn shift_badge(shift_type: &str) -> &'static str {
    match shift_type {
        "MORNING" => "S",
        "AFTERNOON" => "C",
        "FULL_DAY" => "F",
        _ => "",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayCell {
    pub date: Date,
    pub is_today: bool,
    pub is_past: bool,
    pub is_selected: bool,
    pub entries: Vec<CalendarEntry>,
    pub overflow: usize,
}

impl DayCell {
    pub fn day(&self) -> u8 {
        self.date.day()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarCell {
    /// Blank cell before day 1.
    Padding,
    Day(DayCell),
}

/// Sunday-first month grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthGrid {
    pub year: i32,
    pub month: Month,
    pub cells: Vec<CalendarCell>,
}

impl MonthGrid {
    pub fn build(
        year: i32,
        month: u8,
        schedule_by_day: &BTreeMap<u8, Vec<DayScheduleSummary>>,
        today: Date,
        selected: Option<Date>,
    ) -> Result<Self> {
        let first = first_of_month(year, month)?;
        let m = month_from_number(month)?;
        let offset = first.weekday().number_days_from_sunday() as usize;
        let days = m.length(year);

        let mut cells = Vec::with_capacity(offset + days as usize);
        cells.extend(std::iter::repeat(CalendarCell::Padding).take(offset));

        for day in 1..=days {
            let date = Date::from_calendar_date(year, m, day)
                .map_err(|e| ClientError::InvalidInput(e.to_string()))?;
            let summaries = schedule_by_day.get(&day).map(Vec::as_slice).unwrap_or(&[]);
            cells.push(CalendarCell::Day(DayCell {
                date,
                is_today: date == today,
                is_past: is_past(date, today),
                is_selected: selected == Some(date),
                entries: summaries
                    .iter()
                    .take(MAX_ENTRIES_PER_DAY)
                    .map(CalendarEntry::from_summary)
                    .collect(),
                overflow: summaries.len().saturating_sub(MAX_ENTRIES_PER_DAY),
            }));
        }

        Ok(Self { year, month: m, cells })
    }

    pub fn weeks(&self) -> impl Iterator<Item = &[CalendarCell]> {
        self.cells.chunks(7)
    }

    pub fn day(&self, day: u8) -> Option<&DayCell> {
        self.cells.iter().find_map(|c| match c {
            CalendarCell::Day(d) if d.day() == day => Some(d),
            _ => None,
        })
    }

    /// Padding is never selectable; past days are read-only when writing.
    pub fn is_selectable(&self, day: u8, writing: bool) -> bool {
        match self.day(day) {
            Some(cell) => !(writing && cell.is_past),
            None => false,
        }
    }

    /// Plain-text rendering used by the CLI.
    pub fn render(&self) -> String {
        const WIDTH: usize = 14;
        let mut out = String::new();
        let _ = writeln!(out, "{} {}", self.month, self.year);
        for h in WEEKDAY_HEADERS {
            let _ = write!(out, "{:<width$}", h, width = WIDTH);
        }
        out.push('\n');

        for week in self.weeks() {
            let height = week
                .iter()
                .map(|c| match c {
                    CalendarCell::Day(d) => d.entries.len() + usize::from(d.overflow > 0),
                    CalendarCell::Padding => 0,
                })
                .max()
                .unwrap_or(0);

            for line in 0..=height {
                for cell in week {
                    let text = match cell {
                        CalendarCell::Padding => String::new(),
                        CalendarCell::Day(d) if line == 0 => {
                            let marker = if d.is_today {
                                "*"
                            } else if d.is_selected {
                                ">"
                            } else if d.is_past {
                                "."
                            } else {
                                ""
                            };
                            format!("{}{}", d.day(), marker)
                        }
                        CalendarCell::Day(d) => match d.entries.get(line - 1) {
                            Some(e) => format!("{} {}", e.badge, e.short_name),
                            None if line - 1 == d.entries.len() && d.overflow > 0 => {
                                format!("+{} more", d.overflow)
                            }
                            None => String::new(),
                        },
                    };
                    let text: String = text.chars().take(WIDTH - 1).collect();
                    let _ = write!(out, "{:<width$}", text, width = WIDTH);
                }
                out.push('\n');
            }
        }
        out
    }
}
