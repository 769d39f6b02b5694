/*!
 * Unified dataset API for practice data
 *
 * Provides a builder pattern and unified interface for loading the five
 * practice resources into typed, indexed tables.
 */

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
#[cfg(feature = "progress")]
use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;

#[cfg(feature = "progress")]
use indicatif::{ProgressBar, ProgressStyle};

use crate::{Result, PracticeError};
use crate::analytics::PracticeAnalytics;
use crate::cache::{shared_cache, ResourceCache};
use crate::config::{global_config, PracticeConfig, ValidationLevel};
use crate::constants::*;
use crate::data_types::*;
use crate::filter::ProcedureQuery;
use crate::loader::{FromRawRecord, LoadOutcome, QuarantinedRow, RawRecord, RecordLoader};
use crate::schema::Resource;

/// Builder for loading a complete practice dataset
///
/// # Example
/// ```no_run
/// # use practice_analytics::dataset::PracticeDatasetBuilder;
/// let dataset = PracticeDatasetBuilder::new()
///     .data_dir("data")
///     .parallel(true)
///     .build()?;
/// # Ok::<(), practice_analytics::PracticeError>(())
/// ```
pub struct PracticeDatasetBuilder {
    data_dir: Option<PathBuf>,
    cache: Option<Arc<ResourceCache>>,
    validation_level: ValidationLevel,
    parallel: bool,
    #[cfg(feature = "progress")]
    show_progress: bool,
}

impl Default for PracticeDatasetBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PracticeDatasetBuilder {
    /// Create a new dataset builder
    pub fn new() -> Self {
        Self {
            data_dir: None,
            cache: None,
            validation_level: ValidationLevel::default(),
            parallel: true,
            #[cfg(feature = "progress")]
            show_progress: false,
        }
    }

    /// Start from a configuration
    pub fn from_config(config: &PracticeConfig) -> Self {
        let mut builder = Self::new()
            .validation_level(config.validation_level)
            .parallel(config.parallel_loads);
        #[cfg(feature = "progress")]
        {
            builder = builder.show_progress(config.enable_progress_bar);
        }
        if let Some(dir) = &config.data_dir {
            builder = builder.data_dir(dir);
        }
        builder
    }

    /// Start from the installed global configuration
    ///
    /// Falls back to [`PracticeConfig::load`] when none was installed.
    pub fn from_global_config() -> Self {
        Self::from_config(&global_config())
    }

    /// Set the directory holding the resource files
    pub fn data_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.data_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Read through an existing cache instead of the shared one
    pub fn cache(mut self, cache: Arc<ResourceCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Set the validation level for typed conversion
    pub fn validation_level(mut self, level: ValidationLevel) -> Self {
        self.validation_level = level;
        self
    }

    /// Enable or disable concurrent resource loads
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    #[cfg(feature = "progress")]
    /// Enable or disable the loading spinner
    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Build the dataset
    ///
    /// A resource that cannot be loaded becomes an empty table and a
    /// [`LoadIssue`]; only a missing data directory is an error.
    pub fn build(self) -> Result<PracticeDataset> {
        let cache = match (self.cache, &self.data_dir) {
            (Some(cache), _) => cache,
            (None, Some(dir)) => shared_cache(dir),
            (None, None) => {
                return Err(PracticeError::Custom {
                    message: "Data directory not specified".to_string(),
                    suggestion: Some("Use .data_dir() or set PRACTICE_DATA_DIR".to_string()),
                })
            }
        };

        #[cfg(feature = "progress")]
        let spinner = if self.show_progress {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner().template("{spinner} {msg} [{elapsed}]") {
                pb.set_style(style);
            }
            pb.set_message("Loading practice data...");
            pb.enable_steady_tick(Duration::from_millis(100));
            Some(pb)
        } else {
            None
        };

        log::info!("Loading practice dataset from {}", cache.loader().data_dir().display());
        let tables = fetch_all(&cache, self.parallel);

        #[cfg(feature = "progress")]
        if let Some(pb) = spinner {
            pb.finish_with_message("Loading complete");
        }

        let converter = cache.loader().clone().with_validation_level(self.validation_level);
        let dataset = PracticeDataset::from_tables(tables, &converter);
        log::info!(
            "Dataset ready: {} procedures, {} billing rows, {} doctors ({} rows quarantined, {} load issues)",
            dataset.procedures.len(),
            dataset.billing.len(),
            dataset.doctors.len(),
            dataset.quarantined.len(),
            dataset.load_issues.len()
        );
        Ok(dataset)
    }
}

/// Rows (or the load error) for every resource
type FetchedTables = Vec<(Resource, std::result::Result<Arc<Vec<RawRecord>>, PracticeError>)>;

/// Fan out one load per resource and wait for all of them
#[cfg(feature = "parallel")]
fn fetch_all(cache: &ResourceCache, parallel: bool) -> FetchedTables {
    use rayon::prelude::*;

    if !parallel {
        return fetch_sequential(cache);
    }

    Resource::ALL
        .par_iter()
        .map(|&resource| (resource, cache.get(resource)))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn fetch_all(cache: &ResourceCache, _parallel: bool) -> FetchedTables {
    fetch_sequential(cache)
}

fn fetch_sequential(cache: &ResourceCache) -> FetchedTables {
    Resource::ALL
        .iter()
        .map(|&resource| (resource, cache.get(resource)))
        .collect()
}

/// A resource that could not be loaded
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadIssue {
    pub resource: Resource,
    pub message: String,
}

/// Whether a dataset can back a view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetStatus {
    /// Every resource loaded
    Ready,
    /// Some resources failed; views may be partial
    Partial,
    /// Nothing usable was loaded
    Empty,
}

/// Unified practice dataset containing all loaded tables and indexes
#[derive(Debug, Clone, Default)]
pub struct PracticeDataset {
    pub patients: Vec<PatientRecord>,
    pub procedures: Vec<ProcedureRecord>,
    pub billing: Vec<BillingRecord>,
    pub doctors: Vec<DoctorRecord>,
    pub hospitals: Vec<HospitalRecord>,

    /// Rows kept out of the typed tables
    pub quarantined: Vec<QuarantinedRow>,
    /// Resources that failed to load
    pub load_issues: Vec<LoadIssue>,

    // Indexes for fast lookup (positions into the tables above)
    patient_index: HashMap<PatientId, usize>,
    doctor_index: HashMap<ProviderId, usize>,
    hospital_index: HashMap<LocationId, usize>,
    billing_index: HashMap<ProcedureRecordId, usize>,
    procedure_index: HashMap<ProcedureRecordId, usize>,
}

impl PracticeDataset {
    /// Build a dataset from already typed tables
    pub fn new(
        patients: Vec<PatientRecord>,
        procedures: Vec<ProcedureRecord>,
        billing: Vec<BillingRecord>,
        doctors: Vec<DoctorRecord>,
        hospitals: Vec<HospitalRecord>,
    ) -> Self {
        let mut dataset = Self {
            patients,
            procedures,
            billing,
            doctors,
            hospitals,
            ..Default::default()
        };
        dataset.build_indexes();
        dataset
    }

    /// Load a standard dataset from a directory
    ///
    /// # Example
    /// ```no_run
    /// # use practice_analytics::dataset::PracticeDataset;
    /// let dataset = PracticeDataset::load_standard("./data")?;
    /// # Ok::<(), practice_analytics::PracticeError>(())
    /// ```
    pub fn load_standard<P: AsRef<Path>>(dir: P) -> Result<Self> {
        PracticeDatasetBuilder::new().data_dir(dir).build()
    }

    /// Load a dataset straight from disk, bypassing any cache
    pub fn load_uncached(loader: &RecordLoader) -> Self {
        let tables = Resource::ALL
            .iter()
            .map(|&resource| (resource, loader.load(resource).map(Arc::new)))
            .collect();
        Self::from_tables(tables, loader)
    }

    fn from_tables(tables: FetchedTables, converter: &RecordLoader) -> Self {
        let mut dataset = Self::default();

        for (resource, fetched) in tables {
            let rows = match fetched {
                Ok(rows) => rows,
                Err(e) => {
                    log::error!("Failed to load {} resource: {}", resource, e);
                    dataset.load_issues.push(LoadIssue { resource, message: e.to_string() });
                    continue;
                }
            };

            match resource {
                Resource::Patients => dataset.patients = dataset.absorb(&rows, converter),
                Resource::Procedures => dataset.procedures = dataset.absorb(&rows, converter),
                Resource::Billing => dataset.billing = dataset.absorb(&rows, converter),
                Resource::Doctors => dataset.doctors = dataset.absorb(&rows, converter),
                Resource::Hospitals => dataset.hospitals = dataset.absorb(&rows, converter),
            }
        }

        dataset.build_indexes();
        dataset
    }

    /// Convert one resource, recording quarantined rows or a strict failure
    fn absorb<T: FromRawRecord>(&mut self, rows: &[RawRecord], converter: &RecordLoader) -> Vec<T> {
        match converter.load_typed::<T>(rows) {
            Ok(LoadOutcome { records, quarantined }) => {
                self.quarantined.extend(quarantined);
                records
            }
            Err(e) => {
                log::error!("Rejected {} resource under strict validation: {}", T::RESOURCE, e);
                self.load_issues.push(LoadIssue { resource: T::RESOURCE, message: e.to_string() });
                Vec::new()
            }
        }
    }

    /// Build indexes for fast lookups
    pub fn build_indexes(&mut self) {
        self.patient_index = first_positions(&self.patients, |p| Some(p.patient_id.clone()));
        self.doctor_index = first_positions(&self.doctors, |d| Some(d.provider_id.clone()));
        self.hospital_index = first_positions(&self.hospitals, |h| Some(h.location_id.clone()));
        self.billing_index = first_positions(&self.billing, |b| b.procedure_record_id.clone());
        self.procedure_index = first_positions(&self.procedures, |p| Some(p.record_id.clone()));

        let keyed_bills = self.billing.iter().filter(|b| b.procedure_record_id.is_some()).count();
        if keyed_bills > self.billing_index.len() {
            log::warn!(
                "{} billing rows share a Procedure Record ID with an earlier row; only the first is used",
                keyed_bills - self.billing_index.len()
            );
        }
    }

    /// Whether the dataset can back a view
    pub fn status(&self) -> DatasetStatus {
        if self.procedures.is_empty() && self.billing.is_empty() {
            DatasetStatus::Empty
        } else if self.load_issues.is_empty() {
            DatasetStatus::Ready
        } else {
            DatasetStatus::Partial
        }
    }

    /// Check if the dataset has no procedures and no billing
    pub fn is_empty(&self) -> bool {
        self.status() == DatasetStatus::Empty
    }

    /// Get a patient by ID
    pub fn patient(&self, id: &PatientId) -> Option<&PatientRecord> {
        self.patient_index.get(id).and_then(|&idx| self.patients.get(idx))
    }

    /// Get a doctor by Provider ID
    pub fn doctor(&self, id: &ProviderId) -> Option<&DoctorRecord> {
        self.doctor_index.get(id).and_then(|&idx| self.doctors.get(idx))
    }

    /// Get a hospital by Location ID
    pub fn hospital(&self, id: &LocationId) -> Option<&HospitalRecord> {
        self.hospital_index.get(id).and_then(|&idx| self.hospitals.get(idx))
    }

    /// Get the billing row of a procedure
    pub fn billing_for(&self, id: &ProcedureRecordId) -> Option<&BillingRecord> {
        self.billing_index.get(id).and_then(|&idx| self.billing.get(idx))
    }

    /// Get a procedure by Procedure Record ID
    pub fn procedure(&self, id: &ProcedureRecordId) -> Option<&ProcedureRecord> {
        self.procedure_index.get(id).and_then(|&idx| self.procedures.get(idx))
    }

    /// Provider name, or the placeholder when the ID does not resolve
    pub fn provider_name(&self, id: &ProviderId) -> &str {
        self.doctor(id).map(|d| d.name.as_str()).unwrap_or(UNASSIGNED_PROVIDER)
    }

    /// Patient name, or the placeholder when the ID does not resolve
    pub fn patient_name(&self, id: &PatientId) -> String {
        self.patient(id)
            .map(|p| p.full_name())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| UNKNOWN_PATIENT.to_string())
    }

    /// Location name, or the placeholder when the ID does not resolve
    pub fn location_name(&self, id: &LocationId) -> &str {
        self.hospital(id)
            .and_then(|h| h.name.as_deref())
            .unwrap_or(UNKNOWN_LOCATION)
    }

    /// Create an analytics engine for this dataset
    pub fn analytics(&self, as_of: NaiveDate) -> PracticeAnalytics<'_> {
        PracticeAnalytics::new(self, as_of)
    }

    /// Create a procedure query for this dataset
    pub fn query(&self, as_of: NaiveDate) -> ProcedureQuery<'_> {
        ProcedureQuery::new(&self.procedures, as_of)
    }

    /// Get dataset statistics
    pub fn statistics(&self) -> DatasetStatistics {
        DatasetStatistics::from_dataset(self)
    }
}

fn first_positions<T, K, F>(records: &[T], key_of: F) -> HashMap<K, usize>
where
    K: Eq + std::hash::Hash,
    F: Fn(&T) -> Option<K>,
{
    let mut index = HashMap::with_capacity(records.len());
    for (idx, record) in records.iter().enumerate() {
        if let Some(key) = key_of(record) {
            index.entry(key).or_insert(idx);
        }
    }
    index
}

/// Dataset statistics
#[derive(Debug, Clone, Serialize)]
pub struct DatasetStatistics {
    pub status: DatasetStatus,
    pub patients: usize,
    pub procedures: usize,
    pub billing_rows: usize,
    pub doctors: usize,
    pub hospitals: usize,
    pub procedures_without_billing: usize,
    pub procedures_with_unknown_provider: usize,
    pub undated_procedures: usize,
    pub quarantined_rows: usize,
    pub load_issues: Vec<LoadIssue>,
}

impl DatasetStatistics {
    /// Calculate statistics from a dataset
    pub fn from_dataset(dataset: &PracticeDataset) -> Self {
        let mut stats = Self {
            status: dataset.status(),
            patients: dataset.patients.len(),
            procedures: dataset.procedures.len(),
            billing_rows: dataset.billing.len(),
            doctors: dataset.doctors.len(),
            hospitals: dataset.hospitals.len(),
            procedures_without_billing: 0,
            procedures_with_unknown_provider: 0,
            undated_procedures: 0,
            quarantined_rows: dataset.quarantined.len(),
            load_issues: dataset.load_issues.clone(),
        };

        for procedure in &dataset.procedures {
            if dataset.billing_for(&procedure.record_id).is_none() {
                stats.procedures_without_billing += 1;
            }
            if dataset.doctor(&procedure.provider_id).is_none() {
                stats.procedures_with_unknown_provider += 1;
            }
            if procedure.date_of_service.is_none() {
                stats.undated_procedures += 1;
            }
        }

        stats
    }

    /// Print a formatted summary of the statistics
    pub fn print_summary(&self) {
        println!("=== Practice Dataset Statistics ===");
        println!("Status: {:?}", self.status);
        println!("Patients: {}", self.patients);
        println!("Procedures: {}", self.procedures);
        println!("  Without billing: {}", self.procedures_without_billing);
        println!("  With unknown provider: {}", self.procedures_with_unknown_provider);
        println!("  Undated: {}", self.undated_procedures);
        println!("Billing Rows: {}", self.billing_rows);
        println!("Doctors: {}", self.doctors);
        println!("Hospitals: {}", self.hospitals);

        if self.quarantined_rows > 0 {
            println!("Quarantined Rows: {}", self.quarantined_rows);
        }
        for issue in &self.load_issues {
            println!("Load issue ({}): {}", issue.resource, issue.message);
        }
    }
}
