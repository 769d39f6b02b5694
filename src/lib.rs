/*!
 * # Practice Analytics Library
 *
 * Analytics over a medical practice's tabular exports: patients, procedures,
 * billing, doctors and hospitals, each a CSV file in one data directory.
 *
 * ## Features
 *
 * - **Tolerant Loading**: Missing resources load as empty tables, bad amounts
 *   become zero and bad dates drop out of date windows
 * - **Peer Comparison**: A doctor's billing and patient metrics against the
 *   per-peer average of the rest of the practice
 * - **Financial Overview**: Totals, payment sources, payment delays and
 *   outstanding claims for a date window
 * - **Scenario Modeling**: Revenue under changed MBT percentages
 * - **Narrative Insights**: Rule tables that turn numbers into sentences
 * - **Export**: JSON, JSON Lines and CSV
 *
 * ## Quick Start
 *
 * ```no_run
 * use practice_analytics::prelude::*;
 * use chrono::NaiveDate;
 *
 * # fn main() -> Result<()> {
 * let dataset = PracticeDataset::load_standard("./data")?;
 * let as_of = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
 *
 * let request = ProviderAnalysisRequest::new(ProviderId::from("D1"))
 *     .window(DateWindow::TrailingDays(90))
 *     .granularity(Granularity::Month);
 * let view = dataset.analytics(as_of).provider_analysis(&request);
 *
 * println!("{}", view.insight);
 * # Ok(())
 * # }
 * ```
 *
 * ## Loading Data
 *
 * ```no_run
 * # use practice_analytics::prelude::*;
 * # fn main() -> Result<()> {
 * let dataset = PracticeDatasetBuilder::new()
 *     .data_dir("./data")
 *     .validation_level(ValidationLevel::Strict)
 *     .parallel(true)
 *     .build()?;
 *
 * for issue in &dataset.load_issues {
 *     eprintln!("{}: {}", issue.resource, issue.message);
 * }
 * # Ok(())
 * # }
 * ```
 *
 * ## Scenarios
 *
 * ```no_run
 * # use practice_analytics::prelude::*;
 * # use chrono::NaiveDate;
 * # fn main() -> Result<()> {
 * # let dataset = PracticeDataset::load_standard("./data")?;
 * # let as_of = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
 * let scenario = Scenario::new("Consult uplift").with_mbt("Consultation", 150.0);
 * let view = dataset.analytics(as_of).model_scenario(ScenarioPeriod::LastYear, &scenario);
 * println!("{:+.1}%", view.change.percent().unwrap_or(0.0));
 * # Ok(())
 * # }
 * ```
 *
 * ## Data Files
 *
 * - `patients.csv`: Patient ID, first and last name
 * - `procedures.csv`: one row per procedure performed
 * - `billing.csv`: one row per billed procedure
 * - `doctors.csv`: Provider ID and name
 * - `hospitals.csv`: Location ID and name
 */

// Re-export error types from root
pub use error::{PracticeError, Result, ErrorContext, ExportFormat};

// Public modules
pub mod data_types;
pub mod schema;
pub mod error;
pub mod config;
pub mod loader;
pub mod cache;
pub mod dataset;
pub mod filter;
pub mod aggregate;
pub mod comparison;
pub mod trend;
pub mod insight;
pub mod analytics;
pub mod export;

/// Prelude module for convenient imports
///
/// Import everything you need with:
/// ```
/// use practice_analytics::prelude::*;
/// ```
pub mod prelude {
    pub use crate::data_types::*;
    pub use crate::schema::Resource;
    pub use crate::error::{PracticeError, Result};
    pub use crate::config::{ConfigBuilder, PracticeConfig, ValidationLevel};
    pub use crate::loader::RecordLoader;
    pub use crate::cache::ResourceCache;
    pub use crate::dataset::{PracticeDataset, PracticeDatasetBuilder, DatasetStatistics, DatasetStatus};
    pub use crate::filter::{DateWindow, ProcedureQuery};
    pub use crate::aggregate::{Granularity, Reducer, AmountBuckets, DelayBucket};
    pub use crate::comparison::{Delta, Direction, EntityMetrics, PeerSelection};
    pub use crate::trend::Trend;
    pub use crate::analytics::{
        PracticeAnalytics, ProviderAnalysisRequest, ProviderAnalysisView, FinancialView,
        Scenario, ScenarioAdjustment, ScenarioPeriod, ScenarioView, RecentPatientsView,
    };
    pub use crate::export::{ViewExporter, JsonExporter, JsonLinesExporter, CsvExporter};
    pub use crate::ExportFormat;
}

/// Practice data constants
pub mod constants {
    /// File names of the five resources inside the data directory
    pub const RESOURCE_FILE_NAMES: [&str; 5] = [
        "patients.csv",
        "procedures.csv",
        "billing.csv",
        "doctors.csv",
        "hospitals.csv",
    ];

    /// Category selection that disables a filter
    pub const ALL_SELECTION: &str = "all";

    /// Placeholders for failed joins
    pub const UNASSIGNED_PROVIDER: &str = "Not Assigned";
    pub const UNKNOWN_PATIENT: &str = "Unknown Patient";
    pub const UNKNOWN_LOCATION: &str = "Unknown Location";

    /// Name used in insights when the subject doctor is not in the doctors table
    pub const SUBJECT_FALLBACK_NAME: &str = "Selected doctor";

    /// Group for procedures without a code
    pub const OTHER_BUCKET: &str = "Other";

    /// Billed amount bucket edges
    pub const DEFAULT_AMOUNT_EDGES: &[f64] = &[2500.0, 5000.0, 7500.0, 10000.0];

    /// Second-half mean must exceed the first-half mean by this factor to count as increasing
    pub const TREND_UP_FACTOR: f64 = 1.1;
    pub const TREND_DOWN_FACTOR: f64 = 0.9;

    /// Deltas within this many percent are "on par"
    pub const PARITY_THRESHOLD_PERCENT: f64 = 10.0;

    pub const OUTSTANDING_RATIO_HIGH_FACTOR: f64 = 1.2;
    pub const OUTSTANDING_RATIO_LOW_FACTOR: f64 = 0.8;

    pub const DEFAULT_WINDOW_DAYS: u32 = 180;
    pub const DEFAULT_RECENT_LIMIT: usize = 5;
    pub const DEFAULT_OUTSTANDING_LIMIT: usize = 25;
}
