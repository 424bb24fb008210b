//! Text messages exchanged inside frames

use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;

use super::ProtocolError;
use crate::models::{format_date, parse_citizen_id, parse_date, CitizenId};

// ============================================================================
// Sentinels
// ============================================================================

pub const REQUEST: &str = "REQUEST";
pub const ADD_RECORDS: &str = "ADD_RECORDS";
pub const SEARCH: &str = "SEARCH";
pub const EXIT: &str = "EXIT";
pub const ACCEPTED: &str = "ACCEPTED";
pub const REJECTED: &str = "REJECTED";
pub const UPDATE: &str = "UPDATE";
pub const NOT_FOUND: &str = "404";
const YES: &str = "YES";
const NO: &str = "NO";

// ============================================================================
// Commands
// ============================================================================

/// Coordinator-to-worker command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Exact vaccination lookup for one citizen and virus
    TravelRequest { citizen_id: CitizenId, virus: String },
    /// Rescan assigned directories and import new files
    AddRecords,
    /// Full vaccination status of one citizen
    SearchStatus { citizen_id: CitizenId },
    /// Write the log file and exit
    Shutdown,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TravelRequest { citizen_id, virus } => write!(f, "{REQUEST} {citizen_id} {virus}"),
            Self::AddRecords => f.write_str(ADD_RECORDS),
            Self::SearchStatus { citizen_id } => write!(f, "{SEARCH} {citizen_id}"),
            Self::Shutdown => f.write_str(EXIT),
        }
    }
}

impl FromStr for Command {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = s.split_whitespace().collect();
        match tokens.as_slice() {
            [REQUEST, id, virus] => Ok(Self::TravelRequest {
                citizen_id: citizen_id(id)?,
                virus: (*virus).to_string(),
            }),
            [ADD_RECORDS] => Ok(Self::AddRecords),
            [SEARCH, id] => Ok(Self::SearchStatus {
                citizen_id: citizen_id(id)?,
            }),
            [EXIT] => Ok(Self::Shutdown),
            _ => Err(ProtocolError::malformed(format!("unknown command: {s}"))),
        }
    }
}

fn citizen_id(text: &str) -> Result<CitizenId, ProtocolError> {
    parse_citizen_id(text)
        .ok_or_else(|| ProtocolError::malformed(format!("invalid citizen id: {text}")))
}

fn date(text: &str) -> Result<NaiveDate, ProtocolError> {
    parse_date(text).ok_or_else(|| ProtocolError::malformed(format!("invalid date: {text}")))
}

fn number<T: FromStr>(text: &str) -> Result<T, ProtocolError> {
    text.parse()
        .map_err(|_| ProtocolError::malformed(format!("invalid number: {text}")))
}

// ============================================================================
// Replies
// ============================================================================

/// Worker answer to a travel request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TravelReply {
    Vaccinated(NaiveDate),
    NotVaccinated,
}

impl fmt::Display for TravelReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vaccinated(d) => write!(f, "{YES} {}", format_date(*d)),
            Self::NotVaccinated => f.write_str(NO),
        }
    }
}

impl FromStr for TravelReply {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = s.split_whitespace().collect();
        match tokens.as_slice() {
            [YES, d] => Ok(Self::Vaccinated(date(d)?)),
            [NO] => Ok(Self::NotVaccinated),
            _ => Err(ProtocolError::malformed(format!("invalid travel reply: {s}"))),
        }
    }
}

/// Coordinator decision reported back to the worker after a travel request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accepted => ACCEPTED,
            Self::Rejected => REJECTED,
        }
    }

    pub fn is_accepted(self) -> bool {
        matches!(self, Self::Accepted)
    }
}

impl FromStr for Verdict {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            ACCEPTED => Ok(Self::Accepted),
            REJECTED => Ok(Self::Rejected),
            other => Err(ProtocolError::malformed(format!("invalid verdict: {other}"))),
        }
    }
}

/// First frame of a handshake or update: import counters and virus count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HandshakeSummary {
    pub pid: u32,
    pub imported: u64,
    pub inconsistent: u64,
    pub duplicates: u64,
    pub total_lines: u64,
    pub virus_count: u32,
}

impl fmt::Display for HandshakeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {}",
            self.pid,
            self.imported,
            self.inconsistent,
            self.duplicates,
            self.total_lines,
            self.virus_count
        )
    }
}

impl FromStr for HandshakeSummary {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = s.split_whitespace().collect();
        let [pid, imported, inconsistent, duplicates, total_lines, virus_count] = tokens.as_slice()
        else {
            return Err(ProtocolError::malformed(format!("invalid summary: {s}")));
        };
        Ok(Self {
            pid: number(pid)?,
            imported: number(imported)?,
            inconsistent: number(inconsistent)?,
            duplicates: number(duplicates)?,
            total_lines: number(total_lines)?,
            virus_count: number(virus_count)?,
        })
    }
}

/// Worker answer to a status search for a known citizen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitizenStatus {
    pub citizen_id: CitizenId,
    pub first_name: String,
    pub last_name: String,
    pub country: String,
    pub age: u32,
    /// Every known virus in ascending name order with its vaccination date, if any
    pub vaccinations: Vec<(String, Option<NaiveDate>)>,
}

impl fmt::Display for CitizenStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.citizen_id, self.first_name, self.last_name, self.country, self.age
        )?;
        for (virus, vaccinated_on) in &self.vaccinations {
            match vaccinated_on {
                Some(d) => write!(f, " {virus} {}", format_date(*d))?,
                None => write!(f, " {virus} {NO}")?,
            }
        }
        Ok(())
    }
}

impl FromStr for CitizenStatus {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = s.split_whitespace().collect();
        if tokens.len() < 5 || (tokens.len() - 5) % 2 != 0 {
            return Err(ProtocolError::malformed(format!("invalid citizen status: {s}")));
        }
        let vaccinations = tokens[5..]
            .chunks(2)
            .map(|pair| -> Result<(String, Option<NaiveDate>), ProtocolError> {
                let vaccinated_on = match pair[1] {
                    NO => None,
                    d => Some(date(d)?),
                };
                Ok((pair[0].to_string(), vaccinated_on))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            citizen_id: citizen_id(tokens[0])?,
            first_name: tokens[1].to_string(),
            last_name: tokens[2].to_string(),
            country: tokens[3].to_string(),
            age: number(tokens[4])?,
            vaccinations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_text() {
        let cmd = Command::TravelRequest {
            citizen_id: 889,
            virus: "COVID-19".into(),
        };
        assert_eq!(cmd.to_string(), "REQUEST 889 COVID-19");
        assert_eq!("REQUEST 889 COVID-19".parse::<Command>().unwrap(), cmd);
        assert_eq!("EXIT".parse::<Command>().unwrap(), Command::Shutdown);
        assert_eq!(
            "SEARCH 12".parse::<Command>().unwrap(),
            Command::SearchStatus { citizen_id: 12 }
        );
    }

    #[test]
    fn test_unknown_command_rejected() {
        assert!("DANCE".parse::<Command>().is_err());
        assert!("REQUEST abc COVID-19".parse::<Command>().is_err());
    }

    #[test]
    fn test_travel_reply() {
        let d = NaiveDate::from_ymd_opt(2021, 3, 4).unwrap();
        assert_eq!(TravelReply::Vaccinated(d).to_string(), "YES 04-03-2021");
        assert_eq!("NO".parse::<TravelReply>().unwrap(), TravelReply::NotVaccinated);
        assert!("YES".parse::<TravelReply>().is_err());
    }

    #[test]
    fn test_summary_parse() {
        let summary: HandshakeSummary = "4242 10 2 1 13 3".parse().unwrap();
        assert_eq!(summary.pid, 4242);
        assert_eq!(summary.imported, 10);
        assert_eq!(summary.virus_count, 3);
        assert!("1 2 3".parse::<HandshakeSummary>().is_err());
    }

    #[test]
    fn test_citizen_status_text() {
        let status = CitizenStatus {
            citizen_id: 7,
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            country: "England".into(),
            age: 36,
            vaccinations: vec![
                ("COVID-19".into(), NaiveDate::from_ymd_opt(2021, 1, 2)),
                ("H1N1".into(), None),
            ],
        };
        let text = status.to_string();
        assert_eq!(text, "7 Ada Lovelace England 36 COVID-19 02-01-2021 H1N1 NO");
        assert_eq!(text.parse::<CitizenStatus>().unwrap(), status);
    }

    #[test]
    fn test_verdict() {
        assert_eq!("ACCEPTED".parse::<Verdict>().unwrap(), Verdict::Accepted);
        assert_eq!(Verdict::Rejected.as_str(), "REJECTED");
    }
}
