// Core data structures for travel-monitor

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::cmp::Ordering;
use thiserror::Error;

/// Unique positive citizen identifier
pub type CitizenId = u32;

/// Date format used in record files and on the wire
pub const DATE_FORMAT: &str = "%d-%m-%Y";

/// Parse a `DD-MM-YYYY` date
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, DATE_FORMAT).ok()
}

/// Format a date as `DD-MM-YYYY`
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Stable index of a country in a worker's country registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CountryId(pub usize);

/// Stable index of a virus in a virus registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VirusId(pub usize);

// ============================================================================
// Citizen
// ============================================================================

/// A person known to a worker, created on the first valid record for its id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Citizen {
    pub id: CitizenId,
    pub first_name: String,
    pub last_name: String,
    pub country: CountryId,
    pub age: u32,
}

impl Citizen {
    /// True when a record line describes this same person
    pub fn matches(&self, line: &RecordLine, country: CountryId) -> bool {
        self.id == line.citizen_id
            && self.first_name == line.first_name
            && self.last_name == line.last_name
            && self.country == country
            && self.age == line.age
    }
}

/// Entry of a virus' vaccinated index. Ordered and compared by citizen id only.
#[derive(Debug, Clone, Copy)]
pub struct VaccinationRecord {
    pub citizen_id: CitizenId,
    pub date: NaiveDate,
}

impl PartialEq for VaccinationRecord {
    fn eq(&self, other: &Self) -> bool {
        self.citizen_id == other.citizen_id
    }
}

impl Eq for VaccinationRecord {}

impl PartialOrd for VaccinationRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VaccinationRecord {
    fn cmp(&self, other: &Self) -> Ordering {
        self.citizen_id.cmp(&other.citizen_id)
    }
}

impl Borrow<CitizenId> for VaccinationRecord {
    fn borrow(&self) -> &CitizenId {
        &self.citizen_id
    }
}

/// Vaccination state stated by a record line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaccinationStatus {
    Vaccinated(NaiveDate),
    NotVaccinated,
}

// ============================================================================
// Record line
// ============================================================================

/// Why a record line was rejected as inconsistent
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("expected 7 or 8 fields, found {0}")]
    FieldCount(usize),

    #[error("invalid citizen id: {0}")]
    CitizenId(String),

    #[error("invalid {field}: {value}")]
    Name { field: &'static str, value: String },

    #[error("invalid age: {0}")]
    Age(String),

    #[error("invalid vaccination status: {0}")]
    Status(String),

    #[error("vaccinated record without a date")]
    MissingDate,

    #[error("unvaccinated record with a date")]
    UnexpectedDate,

    #[error("invalid date: {0}")]
    Date(String),

    #[error("citizen {0} conflicts with an earlier record")]
    IdentityConflict(CitizenId),
}

/// One validated line of a record file:
/// `id firstName lastName country age virus YES|NO [date]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLine {
    pub citizen_id: CitizenId,
    pub first_name: String,
    pub last_name: String,
    pub country: String,
    pub age: u32,
    pub virus: String,
    pub status: VaccinationStatus,
}

impl RecordLine {
    /// Parse and validate a single line
    pub fn parse(line: &str) -> Result<Self, RecordError> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 7 && fields.len() != 8 {
            return Err(RecordError::FieldCount(fields.len()));
        }

        let citizen_id = parse_citizen_id(fields[0])
            .ok_or_else(|| RecordError::CitizenId(fields[0].to_string()))?;
        let first_name = alphabetic("first name", fields[1])?;
        let last_name = alphabetic("last name", fields[2])?;
        let country = alphabetic("country", fields[3])?;
        let age = fields[4]
            .parse::<u32>()
            .map_err(|_| RecordError::Age(fields[4].to_string()))?;
        let virus = fields[5].to_string();

        let status = match (fields[6], fields.get(7)) {
            ("YES", Some(date)) => VaccinationStatus::Vaccinated(
                parse_date(date).ok_or_else(|| RecordError::Date((*date).to_string()))?,
            ),
            ("YES", None) => return Err(RecordError::MissingDate),
            ("NO", None) => VaccinationStatus::NotVaccinated,
            ("NO", Some(_)) => return Err(RecordError::UnexpectedDate),
            (other, _) => return Err(RecordError::Status(other.to_string())),
        };

        Ok(Self {
            citizen_id,
            first_name,
            last_name,
            country,
            age,
            virus,
            status,
        })
    }

    pub fn is_vaccinated(&self) -> bool {
        matches!(self.status, VaccinationStatus::Vaccinated(_))
    }
}

/// Parse a positive citizen id
pub fn parse_citizen_id(text: &str) -> Option<CitizenId> {
    if !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse::<CitizenId>().ok().filter(|id| *id > 0)
}

fn alphabetic(field: &'static str, value: &str) -> Result<String, RecordError> {
    if value.chars().all(char::is_alphabetic) {
        Ok(value.to_string())
    } else {
        Err(RecordError::Name {
            field,
            value: value.to_string(),
        })
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Age bands used by per-(virus, country) statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgeBand {
    UpTo20,
    From21To40,
    From41To60,
    Over60,
}

impl AgeBand {
    pub const ALL: [AgeBand; 4] = [Self::UpTo20, Self::From21To40, Self::From41To60, Self::Over60];

    pub fn from_age(age: u32) -> Self {
        match age {
            0..=20 => Self::UpTo20,
            21..=40 => Self::From21To40,
            41..=60 => Self::From41To60,
            _ => Self::Over60,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::UpTo20 => "0-20",
            Self::From21To40 => "20-40",
            Self::From41To60 => "40-60",
            Self::Over60 => "60+",
        }
    }
}

/// Registered and vaccinated counts per age band for one (virus, country)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirusCountryStat {
    pub registered: [u64; 4],
    pub vaccinated: [u64; 4],
}

impl VirusCountryStat {
    pub fn register(&mut self, age: u32, vaccinated: bool) {
        let band = AgeBand::from_age(age).index();
        self.registered[band] += 1;
        if vaccinated {
            self.vaccinated[band] += 1;
        }
    }

    pub fn total_registered(&self) -> u64 {
        self.registered.iter().sum()
    }

    pub fn total_vaccinated(&self) -> u64 {
        self.vaccinated.iter().sum()
    }
}
