//! Processing calendar.
//!
//! Working-day estimates and the local-day boundaries used for references,
//! listing filters and display dates.

use chrono::{DateTime, Datelike, Days, FixedOffset, NaiveDate, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use docreq_common::{config::ProcessingConfig, AppError, AppResult};
use docreq_db::entities::document_request::DocumentType;

/// Estimated completion of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Estimate {
    pub working_days: u32,
    pub date: NaiveDate,
}

/// Processing times and the local timezone.
#[derive(Debug, Clone)]
pub struct ProcessingCalendar {
    timezone: Tz,
    transcript_days: u32,
    certificate_days: u32,
    request_days: u32,
}

impl Default for ProcessingCalendar {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::Asia::Bangkok,
            transcript_days: 2,
            certificate_days: 3,
            request_days: 5,
        }
    }
}

impl ProcessingCalendar {
    pub fn from_config(config: &ProcessingConfig) -> AppResult<Self> {
        let timezone = config
            .timezone
            .parse::<Tz>()
            .map_err(|e| AppError::Config(format!("Invalid timezone {}: {e}", config.timezone)))?;

        Ok(Self {
            timezone,
            transcript_days: config.transcript_days,
            certificate_days: config.certificate_days,
            request_days: config.request_days,
        })
    }

    #[must_use]
    pub const fn working_days(&self, document_type: DocumentType) -> u32 {
        match document_type {
            DocumentType::Transcript => self.transcript_days,
            DocumentType::Certificate | DocumentType::Graduation => self.certificate_days,
            DocumentType::Enrollment | DocumentType::General => self.request_days,
        }
    }

    /// Estimate completion for a request submitted on `submitted`.
    #[must_use]
    pub fn estimate(&self, document_type: DocumentType, submitted: NaiveDate) -> Estimate {
        let working_days = self.working_days(document_type);
        Estimate {
            working_days,
            date: add_working_days(submitted, working_days),
        }
    }

    /// Today in the local timezone.
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.local_date(Utc::now().fixed_offset())
    }

    /// Calendar date of an instant in the local timezone.
    #[must_use]
    pub fn local_date(&self, at: DateTime<FixedOffset>) -> NaiveDate {
        at.with_timezone(&self.timezone).date_naive()
    }

    /// Local midnight at the start of `date`.
    pub fn start_of_day(&self, date: NaiveDate) -> AppResult<DateTime<FixedOffset>> {
        self.timezone
            .from_local_datetime(&date.and_time(chrono::NaiveTime::MIN))
            .earliest()
            .map(|at| at.fixed_offset())
            .ok_or_else(|| AppError::Validation(format!("{date} has no local midnight")))
    }

    /// Half-open instant range covering the local days `from..=to`.
    pub fn day_range(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> AppResult<(Option<DateTime<FixedOffset>>, Option<DateTime<FixedOffset>>)> {
        let start = from.map(|d| self.start_of_day(d)).transpose()?;
        let end = to
            .and_then(|d| d.checked_add_days(Days::new(1)))
            .map(|d| self.start_of_day(d))
            .transpose()?;
        Ok((start, end))
    }
}

/// Advance `start` by `days` working days, skipping Saturdays and Sundays.
#[must_use]
pub fn add_working_days(start: NaiveDate, days: u32) -> NaiveDate {
    let mut date = start;
    let mut remaining = days;
    while remaining > 0 {
        match date.succ_opt() {
            Some(next) => date = next,
            None => break,
        }
        if !is_weekend(date) {
            remaining -= 1;
        }
    }
    date
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}
