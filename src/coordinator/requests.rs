//! Travel request decisions and the request log
//!
//! Every decided travel request is appended under its destination country.
//! `/travelStats` is answered from this log alone, without contacting
//! workers.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::models::VirusId;
use crate::storage::RequestTotals;

/// Longest gap between vaccination and travel that is still accepted
pub const MAX_DAYS_SINCE_VACCINATION: i64 = 180;

/// Outcome of a travel request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TravelDecision {
    NotVaccinated,
    NeedsAnotherVaccination,
    Accepted,
}

impl TravelDecision {
    /// Decide from the citizen's vaccination date, if any
    pub fn decide(vaccinated_on: Option<NaiveDate>, travel_date: NaiveDate) -> Self {
        match vaccinated_on {
            None => Self::NotVaccinated,
            Some(date) if date > travel_date => Self::NotVaccinated,
            Some(date) if (travel_date - date).num_days() > MAX_DAYS_SINCE_VACCINATION => {
                Self::NeedsAnotherVaccination
            }
            Some(_) => Self::Accepted,
        }
    }

    pub fn is_accepted(self) -> bool {
        self == Self::Accepted
    }

    /// Message printed to the user
    pub fn message(self) -> &'static str {
        match self {
            Self::NotVaccinated => "REQUEST REJECTED - YOU ARE NOT VACCINATED",
            Self::NeedsAnotherVaccination => {
                "REQUEST REJECTED - YOU WILL NEED ANOTHER VACCINATION BEFORE TRAVEL DATE"
            }
            Self::Accepted => "REQUEST ACCEPTED - HAPPY TRAVELS",
        }
    }
}

/// One decided request, stored under its destination country
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TravelRequestRecord {
    pub virus: VirusId,
    pub accepted: bool,
    pub date: NaiveDate,
}

/// Decided requests grouped by destination country
#[derive(Debug, Clone, Default)]
pub struct RequestLog {
    by_country: BTreeMap<String, Vec<TravelRequestRecord>>,
}

impl RequestLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, country_to: &str, record: TravelRequestRecord) {
        self.by_country
            .entry(country_to.to_string())
            .or_default()
            .push(record);
    }

    pub fn is_empty(&self) -> bool {
        self.by_country.is_empty()
    }

    pub fn contains(&self, country: &str) -> bool {
        self.by_country.contains_key(country)
    }

    /// Destination countries with at least one request, ascending
    pub fn countries(&self) -> impl Iterator<Item = &str> {
        self.by_country.keys().map(String::as_str)
    }

    /// Counts for `virus` into `country` within `[from, to]`
    pub fn stats(&self, country: &str, virus: VirusId, from: NaiveDate, to: NaiveDate) -> RequestTotals {
        let mut totals = RequestTotals::default();
        let records = self.by_country.get(country).map(Vec::as_slice).unwrap_or_default();
        for record in records
            .iter()
            .filter(|r| r.virus == virus && r.date >= from && r.date <= to)
        {
            totals.record(record.accepted);
        }
        totals
    }

    /// Counts over every request ever decided
    pub fn totals(&self) -> RequestTotals {
        let mut totals = RequestTotals::default();
        for record in self.by_country.values().flatten() {
            totals.record(record.accepted);
        }
        totals
    }
}

/// Render one `/travelStats` block
pub fn render_stats(country: &str, virus: &str, totals: RequestTotals) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{country} STATISTICS {virus}");
    let _ = writeln!(out, "TOTAL REQUESTS {}", totals.total());
    let _ = writeln!(out, "ACCEPTED {}", totals.accepted);
    let _ = write!(out, "REJECTED {}", totals.rejected);
    out
}
