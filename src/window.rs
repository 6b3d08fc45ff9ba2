use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Utc};

/// The run's single reference clock.
///
/// Every query and formatter that needs "today" or "the last 30 days" reads
/// from one `ReportingWindow` computed at run start; nothing recomputes the
/// current time mid-run, so all window boundaries agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportingWindow {
    pub now: DateTime<Utc>,
    pub today: NaiveDate,
    pub year_start: NaiveDate,
    pub month_start: NaiveDate,
    pub week_start: NaiveDate,
    pub window_start: NaiveDate,
}

/// Length of the trailing window used by the returning-patient, payment-mix
/// and daily-trend queries.
pub const TRAILING_WINDOW_DAYS: i64 = 30;

impl ReportingWindow {
    pub fn at(now: DateTime<Utc>) -> Self {
        let today = now.date_naive();
        // Dates constructed from an existing date's fields are always valid.
        let year_start = NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today);
        let month_start =
            NaiveDate::from_ymd_opt(today.year(), today.month(), 1).unwrap_or(today);
        let week_start =
            today - Duration::days(today.weekday().num_days_from_monday() as i64);
        let window_start = today - Duration::days(TRAILING_WINDOW_DAYS);

        ReportingWindow {
            now,
            today,
            year_start,
            month_start,
            week_start,
            window_start,
        }
    }

    pub fn current() -> Self {
        Self::at(Utc::now())
    }

    /// Reference timestamp used for age calculations.
    pub fn reference(&self) -> NaiveDateTime {
        self.now.naive_utc()
    }

    /// Inclusive lower bound of the trailing window.
    pub fn window_start_at(&self) -> NaiveDateTime {
        self.window_start.and_hms_opt(0, 0, 0).unwrap_or_else(|| self.reference())
    }

    /// Inclusive upper bound of the trailing window.
    pub fn window_end_at(&self) -> NaiveDateTime {
        self.today.and_hms_opt(23, 59, 59).unwrap_or_else(|| self.reference())
    }

    /// Human-readable window label used in the workbook banner.
    pub fn window_label(&self) -> String {
        format!("{} to {}", self.window_start.format("%Y-%m-%d"), self.today.format("%Y-%m-%d"))
    }
}
