//! Worker-side record store
//!
//! Holds every imported record of a worker's shard:
//!
//! ```text
//! WorkerStore
//!  ├── countries  SortedRegistry<Country>          (ascending, stable ids)
//!  ├── viruses    SortedRegistry<Virus>            (ascending, stable ids)
//!  │     └── Virus { filter, vaccinated, unvaccinated }
//!  ├── citizens   ChainedTable<CitizenId, Citizen>
//!  └── stats      ChainedTable<(VirusId, CountryId), VirusCountryStat>
//! ```
//!
//! The store itself is single-threaded; the import pipeline serializes all
//! mutation behind one lock.

use chrono::NaiveDate;

use super::registry::{Named, SortedRegistry};
use crate::index::{
    ChainedTable, MembershipFilter, OrderedIndex, CITIZEN_BUCKETS, DEFAULT_HASH_FUNCTIONS,
    DEFAULT_MAX_LEVEL, STAT_BUCKETS,
};
use crate::models::{
    Citizen, CitizenId, CountryId, RecordError, RecordLine, VaccinationRecord, VaccinationStatus,
    VirusCountryStat, VirusId,
};
use crate::protocol::CitizenStatus;

/// Sizing of the per-virus structures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreSettings {
    pub filter_bytes: usize,
    pub hash_functions: usize,
    pub max_level: usize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            filter_bytes: 100_000,
            hash_functions: DEFAULT_HASH_FUNCTIONS,
            max_level: DEFAULT_MAX_LEVEL,
        }
    }
}

/// A country present in the shard
#[derive(Debug, Clone)]
pub struct Country {
    pub name: String,
}

impl Named for Country {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Per-virus filter and exact indices
#[derive(Debug, Clone)]
pub struct Virus {
    pub name: String,
    pub filter: MembershipFilter,
    pub vaccinated: OrderedIndex<VaccinationRecord>,
    pub unvaccinated: OrderedIndex<CitizenId>,
}

impl Virus {
    pub fn new(name: &str, settings: &StoreSettings) -> Self {
        Self {
            name: name.to_string(),
            filter: MembershipFilter::new(settings.filter_bytes, settings.hash_functions),
            vaccinated: OrderedIndex::with_max_level(settings.max_level),
            unvaccinated: OrderedIndex::with_max_level(settings.max_level),
        }
    }

    /// Exact vaccination date, pre-screened by the filter
    pub fn vaccination_date(&self, citizen_id: CitizenId) -> Option<NaiveDate> {
        if !self.filter.check(citizen_id.to_string()) {
            return None;
        }
        self.vaccinated.search(&citizen_id).map(|r| r.date)
    }

    /// True when the citizen already has an entry for this virus
    pub fn has_record(&self, citizen_id: CitizenId) -> bool {
        self.vaccination_date(citizen_id).is_some() || self.unvaccinated.contains(&citizen_id)
    }
}

impl Named for Virus {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Result of offering one parsed line to the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Imported,
    Duplicate,
    Inconsistent(RecordError),
}

/// All records of one worker
#[derive(Debug, Clone)]
pub struct WorkerStore {
    settings: StoreSettings,
    countries: SortedRegistry<Country>,
    viruses: SortedRegistry<Virus>,
    citizens: ChainedTable<CitizenId, Citizen>,
    stats: ChainedTable<(VirusId, CountryId), VirusCountryStat>,
}

impl WorkerStore {
    pub fn new(settings: StoreSettings) -> Self {
        Self {
            settings,
            countries: SortedRegistry::new(),
            viruses: SortedRegistry::new(),
            citizens: ChainedTable::new(CITIZEN_BUCKETS),
            stats: ChainedTable::new(STAT_BUCKETS),
        }
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    /// Insert a validated line, enforcing identity agreement and deduplication
    pub fn insert(&mut self, line: &RecordLine) -> InsertOutcome {
        if let Some(existing) = self.citizens.get(&line.citizen_id) {
            let same_person = self
                .countries
                .find(&line.country)
                .is_some_and(|country| existing.matches(line, CountryId(country)));
            if !same_person {
                return InsertOutcome::Inconsistent(RecordError::IdentityConflict(line.citizen_id));
            }
        }

        let settings = self.settings;
        let (virus_id, virus) = self
            .viruses
            .entry(&line.virus, || Virus::new(&line.virus, &settings));

        if virus.has_record(line.citizen_id) {
            return InsertOutcome::Duplicate;
        }
        match line.status {
            VaccinationStatus::Vaccinated(date) => {
                virus.filter.insert(line.citizen_id.to_string());
                virus.vaccinated.insert(VaccinationRecord {
                    citizen_id: line.citizen_id,
                    date,
                });
            }
            VaccinationStatus::NotVaccinated => {
                virus.unvaccinated.insert(line.citizen_id);
            }
        }

        let (country_id, _) = self.countries.insert_if_absent(&line.country, || Country {
            name: line.country.clone(),
        });
        let country = CountryId(country_id);
        self.citizens.get_or_insert_with(line.citizen_id, || Citizen {
            id: line.citizen_id,
            first_name: line.first_name.clone(),
            last_name: line.last_name.clone(),
            country,
            age: line.age,
        });
        self.stats
            .get_or_insert_with((VirusId(virus_id), country), VirusCountryStat::default)
            .register(line.age, line.is_vaccinated());

        InsertOutcome::Imported
    }

    /// Date the citizen was vaccinated against `virus`, if any
    pub fn vaccination_date(&self, citizen_id: CitizenId, virus: &str) -> Option<NaiveDate> {
        self.viruses.get_by_name(virus)?.vaccination_date(citizen_id)
    }

    /// Full vaccination status of a known citizen
    pub fn citizen_status(&self, citizen_id: CitizenId) -> Option<CitizenStatus> {
        let citizen = self.citizens.get(&citizen_id)?;
        let country = self.countries.get(citizen.country.0)?;
        let vaccinations = self
            .viruses
            .iter()
            .map(|(_, virus)| (virus.name.clone(), virus.vaccination_date(citizen_id)))
            .collect();
        Some(CitizenStatus {
            citizen_id,
            first_name: citizen.first_name.clone(),
            last_name: citizen.last_name.clone(),
            country: country.name.clone(),
            age: citizen.age,
            vaccinations,
        })
    }

    /// `(virus name, filter bytes)` in ascending virus order
    pub fn filters(&self) -> Vec<(String, Vec<u8>)> {
        self.viruses
            .iter()
            .map(|(_, virus)| (virus.name.clone(), virus.filter.as_bytes().to_vec()))
            .collect()
    }

    /// Registered/vaccinated counts for one (virus, country)
    pub fn stat(&self, virus: &str, country: &str) -> Option<VirusCountryStat> {
        let virus = VirusId(self.viruses.find(virus)?);
        let country = CountryId(self.countries.find(country)?);
        self.stats.get(&(virus, country)).copied()
    }

    pub fn country_names(&self) -> Vec<String> {
        self.countries.names().map(str::to_string).collect()
    }

    pub fn virus_names(&self) -> Vec<String> {
        self.viruses.names().map(str::to_string).collect()
    }

    pub fn citizen(&self, citizen_id: CitizenId) -> Option<&Citizen> {
        self.citizens.get(&citizen_id)
    }

    pub fn citizen_count(&self) -> usize {
        self.citizens.len()
    }

    pub fn virus_count(&self) -> usize {
        self.viruses.len()
    }

    /// Records held across all viruses
    pub fn record_count(&self) -> usize {
        self.viruses
            .iter()
            .map(|(_, v)| v.vaccinated.len() + v.unvaccinated.len())
            .sum()
    }
}

impl Default for WorkerStore {
    fn default() -> Self {
        Self::new(StoreSettings::default())
    }
}
