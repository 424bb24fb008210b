//! Interactive command parsing
//!
//! Lines typed at the coordinator prompt are parsed into [`UserCommand`]s.
//! Argument-level validation (counts, ids, dates, date order) happens here;
//! checks that need coordinator state (known countries and viruses) happen
//! when the command is executed.

use chrono::NaiveDate;
use thiserror::Error;

use crate::models::{parse_citizen_id, parse_date, CitizenId};

/// Command list printed by `/help`
pub const HELP_TEXT: &str = "\
/travelRequest citizenID date countryFrom countryTo virusName
/travelStats virusName date1 date2 [country]
/addVaccinationRecords country
/searchVaccinationStatus citizenID
/exit";

/// Prompt hint shown before every command
pub const PROMPT_HINT: &str =
    "Type /help to display the available options or /exit to exit the application.";

/// A query that cannot be answered, reported to the user verbatim
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("INVALID NUMBER OF ARGUMENTS")]
    ArgumentCount,

    #[error("INVALID CITIZEN ID")]
    InvalidCitizenId,

    #[error("INVALID DATE GIVEN")]
    InvalidDate,

    #[error("date1 SHOULD BE OLDER THAN date2")]
    DateOrder,

    #[error("THERE IS NO DATA YET")]
    NoData,

    #[error("NO SUCH COUNTRY FOUND")]
    NoSuchCountry,

    #[error("THERE IS NO DATA FOR THIS COUNTRY YET")]
    NoDataForCountry,

    #[error("NO SUCH VIRUS FOUND")]
    NoSuchVirus,

    #[error("NO NEW FILES FOUND")]
    NoNewFiles,

    #[error("USER NOT FOUND IN DATABASE")]
    UserNotFound,

    #[error("SOMETHING WENT WRONG...")]
    WorkerUnavailable,
}

/// A parsed interactive command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    TravelRequest {
        citizen_id: CitizenId,
        date: NaiveDate,
        country_from: String,
        country_to: String,
        virus: String,
    },
    TravelStats {
        virus: String,
        from: NaiveDate,
        to: NaiveDate,
        country: Option<String>,
    },
    AddVaccinationRecords {
        country: String,
    },
    SearchVaccinationStatus {
        citizen_id: CitizenId,
    },
    Help,
    Exit,
}

impl UserCommand {
    /// Parse one input line. `None` for blank or unrecognized input.
    pub fn parse(line: &str) -> Option<Result<Self, QueryError>> {
        let mut tokens = line.split_whitespace();
        let name = tokens.next()?;
        let args: Vec<&str> = tokens.collect();

        let parsed = match name {
            "/travelRequest" => Self::travel_request(&args),
            "/travelStats" => Self::travel_stats(&args),
            "/addVaccinationRecords" => match args.as_slice() {
                [country] => Ok(Self::AddVaccinationRecords {
                    country: (*country).to_string(),
                }),
                _ => Err(QueryError::ArgumentCount),
            },
            "/searchVaccinationStatus" => match args.as_slice() {
                [id] => citizen_id(id).map(|citizen_id| Self::SearchVaccinationStatus { citizen_id }),
                _ => Err(QueryError::ArgumentCount),
            },
            "/help" => Ok(Self::Help),
            "/exit" => Ok(Self::Exit),
            _ => return None,
        };
        Some(parsed)
    }

    fn travel_request(args: &[&str]) -> Result<Self, QueryError> {
        let [id, date_text, country_from, country_to, virus] = args else {
            return Err(QueryError::ArgumentCount);
        };
        Ok(Self::TravelRequest {
            citizen_id: citizen_id(id)?,
            date: date(date_text)?,
            country_from: (*country_from).to_string(),
            country_to: (*country_to).to_string(),
            virus: (*virus).to_string(),
        })
    }

    fn travel_stats(args: &[&str]) -> Result<Self, QueryError> {
        let (virus, from, to, country) = match args {
            [virus, from, to] => (virus, from, to, None),
            [virus, from, to, country] => (virus, from, to, Some((*country).to_string())),
            _ => return Err(QueryError::ArgumentCount),
        };
        let from = date(from)?;
        let to = date(to)?;
        if from > to {
            return Err(QueryError::DateOrder);
        }
        Ok(Self::TravelStats {
            virus: (*virus).to_string(),
            from,
            to,
            country,
        })
    }
}

fn citizen_id(text: &str) -> Result<CitizenId, QueryError> {
    parse_citizen_id(text).ok_or(QueryError::InvalidCitizenId)
}

fn date(text: &str) -> Result<NaiveDate, QueryError> {
    parse_date(text).ok_or(QueryError::InvalidDate)
}
