/*!
 * Analytics views over a practice dataset
 *
 * Each view is a plain serializable object holding computed metrics,
 * bucketed series and an insight sentence, ready for a rendering layer.
 * Every view is recomputed from the dataset and an explicit as-of date, so
 * the same inputs always give the same view.
 */

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::aggregate::*;
use crate::comparison::*;
use crate::constants::*;
use crate::data_types::*;
use crate::dataset::PracticeDataset;
use crate::filter::*;
use crate::insight::*;
use crate::trend::{classify_trend, period_over_period, Trend};

/// Analytics engine for practice data
pub struct PracticeAnalytics<'a> {
    dataset: &'a PracticeDataset,
    /// Date that trailing windows end on
    as_of: NaiveDate,
}

impl<'a> PracticeAnalytics<'a> {
    /// Create a new analytics engine over a dataset
    pub fn new(dataset: &'a PracticeDataset, as_of: NaiveDate) -> Self {
        Self { dataset, as_of }
    }

    pub fn as_of(&self) -> NaiveDate {
        self.as_of
    }

    /// Procedures served inside a window, optionally at one location
    pub fn procedures_in(&self, window: DateWindow, location: &str) -> Vec<&'a ProcedureRecord> {
        let dated = self.dataset.query(self.as_of).within(window).execute();
        filter_by_category(dated, ProcedureRecord::location_str, location)
    }

    /// Billing rows billed inside a window
    pub fn billing_in(&self, window: DateWindow) -> Vec<&'a BillingRecord> {
        let dataset = self.dataset;
        filter_by_date_range(&dataset.billing, |b| b.date_billed, window, self.as_of)
    }

    /// Metrics of every provider with procedures in the window, plus every known doctor
    pub fn provider_summaries(&self, window: DateWindow, location: &str) -> Vec<ProviderSummary> {
        let dataset = self.dataset;
        let billing_of = |p: &ProcedureRecord| dataset.billing_for(&p.record_id);

        let by_provider = group_by_key(self.procedures_in(window, location), |p| p.provider_id.clone());
        let mut ids: BTreeSet<&ProviderId> = by_provider.keys().collect();
        ids.extend(dataset.doctors.iter().map(|d| &d.provider_id).filter(|id| !id.as_str().is_empty()));

        ids.into_iter()
            .map(|id| {
                let metrics = by_provider.get(id)
                    .map(|procedures| entity_metrics(procedures.iter().copied(), billing_of))
                    .unwrap_or_default();
                ProviderSummary {
                    provider_id: id.clone(),
                    provider_name: dataset.provider_name(id).to_string(),
                    outstanding_ratio: metrics.outstanding_ratio(),
                    metrics,
                }
            })
            .collect()
    }

    /// Compare one provider against a peer set
    pub fn provider_analysis(&self, request: &ProviderAnalysisRequest) -> ProviderAnalysisView {
        let dataset = self.dataset;
        let billing_of = |p: &ProcedureRecord| dataset.billing_for(&p.record_id);
        let billed_of = |p: &ProcedureRecord| billing_of(p).map(|b| b.billed_amount).unwrap_or(0.0);
        let served = |p: &ProcedureRecord| p.date_of_service;
        let billed_on = |p: &ProcedureRecord| billing_of(p).and_then(|b| b.date_billed);
        let granularity = request.granularity;

        let (period_start, period_end) = request.window.resolve(self.as_of);
        let by_provider = group_by_key(
            self.procedures_in(request.window, &request.location),
            |p| p.provider_id.clone(),
        );

        let subject_procedures: Vec<&ProcedureRecord> = by_provider.get(&request.provider)
            .cloned()
            .unwrap_or_default();
        let peer_ids = request.peers.resolve(&request.provider, &dataset.doctors);
        let peer_procedures: Vec<&ProcedureRecord> = peer_ids.iter()
            .filter_map(|id| by_provider.get(id))
            .flatten()
            .copied()
            .collect();

        let subject = entity_metrics(subject_procedures.iter().copied(), billing_of);
        let per_peer: Vec<EntityMetrics> = peer_ids.iter()
            .map(|id| {
                by_provider.get(id)
                    .map(|procedures| entity_metrics(procedures.iter().copied(), billing_of))
                    .unwrap_or_default()
            })
            .collect();
        let peer = peer_average(&per_peer);
        let peer_divisor = peer_ids.len().max(1) as f64;

        let subject_counts = time_series(subject_procedures.iter().copied(), served, granularity, Reducer::Count, |_| 0.0);
        let peer_counts = time_series(peer_procedures.iter().copied(), served, granularity, Reducer::Count, |_| 0.0);
        let subject_billed = time_series(subject_procedures.iter().copied(), billed_on, granularity, Reducer::Sum, billed_of);
        let peer_billed = time_series(peer_procedures.iter().copied(), billed_on, granularity, Reducer::Sum, billed_of);

        // Both series share one period axis
        let periods: BTreeSet<String> = [&subject_counts, &peer_counts, &subject_billed, &peer_billed]
            .into_iter()
            .flat_map(|series| series.keys().cloned())
            .collect();
        let procedure_series = comparison_series(&periods, &subject_counts, &peer_counts, peer_divisor);
        let billing_series = comparison_series(&periods, &subject_billed, &peer_billed, peer_divisor);

        let subject_volume: Vec<f64> = procedure_series.iter().map(|point| point.subject).collect();
        let trend = classify_trend(&subject_volume);

        let procedure_mix = group_by_key(subject_procedures.iter().copied(), |p| code_prefix_key(p.code.as_deref()))
            .into_iter()
            .map(|(prefix, group)| MixEntry { prefix, count: group.len() })
            .collect();

        let insight = provider_insight(&ProviderInsightInput {
            provider_name: dataset.doctor(&request.provider)
                .map(|d| d.name.clone())
                .unwrap_or_else(|| SUBJECT_FALLBACK_NAME.to_string()),
            subject,
            peer,
            trend,
        });

        log::debug!(
            "Provider analysis for {}: {} procedures against {} peers",
            request.provider,
            subject_procedures.len(),
            peer_ids.len()
        );

        ProviderAnalysisView {
            provider_id: request.provider.clone(),
            provider_name: dataset.provider_name(&request.provider).to_string(),
            peer_ids,
            period_start,
            period_end,
            location: request.location.clone(),
            subject,
            peer_average: peer,
            deltas: MetricDeltas::between(&subject, &peer),
            subject_outstanding_ratio: subject.outstanding_ratio(),
            peer_outstanding_ratio: peer.outstanding_ratio(),
            procedure_series,
            billing_series,
            procedure_mix,
            trend,
            insight,
        }
    }

    /// Financial analysis over a window on the billed date
    pub fn financial(&self, window: DateWindow, claims_limit: usize) -> FinancialView {
        let (period_start, period_end) = window.resolve(self.as_of);
        let bills = self.billing_in(window);
        let previous_bills = self.billing_in(window.previous(self.as_of));

        let totals = FinancialTotals::from_bills(&bills);
        let previous_totals = FinancialTotals::from_bills(&previous_bills);

        let payment_sources = PaymentSource::ALL.iter()
            .map(|&source| {
                let amount: f64 = bills.iter().map(|b| b.paid_amount(source)).sum();
                SourceShare {
                    source,
                    label: source.label().to_string(),
                    amount,
                    percent: share_of(amount, totals.received),
                }
            })
            .collect();

        let payment_delays = PaymentSource::ALL.iter()
            .map(|&source| DelayDistribution {
                source,
                buckets: payment_delay_distribution(bills.iter().copied(), source),
            })
            .collect();

        let revenue_series = time_series(
            bills.iter().copied(),
            |b| b.date_billed,
            Granularity::Month,
            Reducer::Sum,
            |b| b.billed_amount,
        )
        .into_iter()
        .map(|(period, value)| SeriesPoint { period, value })
        .collect();

        let changes = PeriodChanges {
            revenue: period_over_period(totals.revenue, previous_totals.revenue),
            received: period_over_period(totals.received, previous_totals.received),
            outstanding: period_over_period(totals.outstanding, previous_totals.outstanding),
            medical_aid_share_change: totals.medical_aid_share - previous_totals.medical_aid_share,
        };

        let insight = financial_insight(&FinancialInsightInput {
            revenue: changes.revenue,
            received: changes.received,
            outstanding: changes.outstanding,
            medical_aid_share_change: changes.medical_aid_share_change,
        });

        FinancialView {
            period_start,
            period_end,
            totals,
            previous_totals,
            changes,
            claim_sizes: AmountBuckets::default().distribution(bills.iter().copied(), |b| b.billed_amount),
            payment_sources,
            payment_delays,
            revenue_series,
            outstanding_claims: self.outstanding_claims(&bills, claims_limit),
            insight,
        }
    }

    /// Unpaid claims, newest first
    fn outstanding_claims(&self, bills: &[&'a BillingRecord], limit: usize) -> Vec<OutstandingClaim> {
        let dataset = self.dataset;
        let mut open: Vec<&BillingRecord> = bills.iter()
            .copied()
            .filter(|b| b.outstanding_amount > 0.0)
            .collect();
        open.sort_by(|a, b| b.date_billed.cmp(&a.date_billed));
        open.truncate(limit);

        left_join(
            open,
            &dataset.procedures,
            |b| b.procedure_record_id.clone(),
            |p| Some(p.record_id.clone()),
        )
        .into_iter()
        .map(|joined| {
            let bill = joined.left;
            let responsible = if bill.date_paid_medical_aid.is_none() {
                PaymentSource::MedicalAid
            } else {
                PaymentSource::Patient
            };
            OutstandingClaim {
                procedure_record_id: bill.procedure_record_id.clone(),
                patient_name: joined.right
                    .map(|p| dataset.patient_name(&p.patient_id))
                    .unwrap_or_else(|| UNKNOWN_PATIENT.to_string()),
                procedure_description: joined.right.and_then(|p| p.description.clone()),
                date_billed: bill.date_billed,
                billed_amount: bill.billed_amount,
                outstanding_amount: bill.outstanding_amount,
                responsible_party: responsible.label().to_string(),
            }
        })
        .collect()
    }

    /// Current MBT percentage, average cost and count per procedure description
    pub fn scenario_baseline(&self, period: ScenarioPeriod) -> Vec<ProcedureBaseline> {
        let dataset = self.dataset;
        let window = period.window(self.as_of);

        let counts = group_by_key(
            filter_by_date_range(&dataset.procedures, |p| p.date_of_service, window, self.as_of)
                .into_iter()
                .filter(|p| p.description.is_some()),
            |p| p.description.clone().unwrap_or_default(),
        );

        let mut by_description: BTreeMap<String, Vec<&BillingRecord>> = BTreeMap::new();
        let joined = left_join(
            self.billing_in(window),
            &dataset.procedures,
            |b| b.procedure_record_id.clone(),
            |p| Some(p.record_id.clone()),
        );
        for row in joined {
            if let Some(description) = row.right.and_then(|p| p.description.as_ref()) {
                by_description.entry(description.clone()).or_default().push(row.left);
            }
        }

        by_description.into_iter()
            .map(|(description, bills)| ProcedureBaseline {
                current_mbt: reduce_group(&bills, Reducer::Average, |b| b.mbt_percentage),
                average_cost: reduce_group(&bills, Reducer::Average, |b| b.billed_amount),
                procedure_count: counts.get(&description).map(Vec::len).unwrap_or(0) as f64,
                description,
            })
            .collect()
    }

    /// Revenue under new MBT percentages compared to the baseline
    pub fn model_scenario(&self, period: ScenarioPeriod, scenario: &Scenario) -> ScenarioView {
        let (period_start, period_end) = period.window(self.as_of).resolve(self.as_of);

        let lines: Vec<ScenarioLine> = self.scenario_baseline(period)
            .into_iter()
            .map(|baseline| {
                let adjustment = scenario.adjustment_for(&baseline.description);
                let new_mbt = adjustment.map(|a| a.new_mbt).unwrap_or(baseline.current_mbt);
                let scenario_count = adjustment
                    .and_then(|a| a.procedure_count)
                    .unwrap_or(baseline.procedure_count);
                let ratio = if baseline.current_mbt == 0.0 { 1.0 } else { new_mbt / baseline.current_mbt };

                ScenarioLine {
                    base_revenue: baseline.procedure_count * baseline.average_cost,
                    scenario_revenue: ratio * scenario_count * baseline.average_cost,
                    new_mbt,
                    scenario_count,
                    baseline,
                }
            })
            .collect();

        for adjustment in &scenario.adjustments {
            if !lines.iter().any(|l| l.baseline.description == adjustment.description) {
                log::warn!(
                    "Scenario '{}' adjusts '{}', which has no billing in {}",
                    scenario.name,
                    adjustment.description,
                    period.label()
                );
            }
        }

        let total_base: f64 = lines.iter().map(|l| l.base_revenue).sum();
        let total_scenario: f64 = lines.iter().map(|l| l.scenario_revenue).sum();

        ScenarioView {
            name: scenario.name.clone(),
            period,
            period_start,
            period_end,
            lines,
            total_base,
            total_scenario,
            difference: total_scenario - total_base,
            change: percentage_delta(total_scenario, total_base),
        }
    }

    /// Most recent visit of the latest distinct patients
    pub fn recent_patients(&self, limit: usize) -> RecentPatientsView {
        let dataset = self.dataset;
        let mut visits: Vec<&ProcedureRecord> = dataset.procedures.iter()
            .filter(|p| p.date_of_service.map(|d| d <= self.as_of).unwrap_or(true))
            .collect();
        visits.sort_by(|a, b| b.date_of_service.cmp(&a.date_of_service));

        let mut seen: HashSet<&PatientId> = HashSet::new();
        let patients = visits.into_iter()
            .filter(|p| seen.insert(&p.patient_id))
            .take(limit)
            .map(|p| RecentPatient {
                patient_id: p.patient_id.clone(),
                patient_name: dataset.patient_name(&p.patient_id),
                provider_name: dataset.provider_name(&p.provider_id).to_string(),
                location_name: p.location_id.as_ref()
                    .map(|id| dataset.location_name(id))
                    .unwrap_or(UNKNOWN_LOCATION)
                    .to_string(),
                procedure_description: p.description.clone(),
                last_visit: p.date_of_service,
            })
            .collect();

        RecentPatientsView { as_of: self.as_of, patients }
    }
}

/// Subject and per-peer values over the union of periods, in period order
fn comparison_series(
    periods: &BTreeSet<String>,
    subject: &BTreeMap<String, f64>,
    peers: &BTreeMap<String, f64>,
    peer_divisor: f64,
) -> Vec<ComparisonPoint> {
    periods.iter()
        .map(|period| ComparisonPoint {
            period: period.clone(),
            subject: subject.get(period).copied().unwrap_or(0.0),
            peer_average: peers.get(period).copied().unwrap_or(0.0) / peer_divisor,
        })
        .collect()
}

fn share_of(part: f64, whole: f64) -> f64 {
    if whole > 0.0 { part / whole * 100.0 } else { 0.0 }
}

/// Parameters of a provider analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderAnalysisRequest {
    pub provider: ProviderId,
    pub peers: PeerSelection,
    pub window: DateWindow,
    /// Location ID, or `"all"`
    pub location: String,
    pub granularity: Granularity,
}

impl ProviderAnalysisRequest {
    pub fn new(provider: ProviderId) -> Self {
        Self {
            provider,
            peers: PeerSelection::AllOthers,
            window: DateWindow::TrailingDays(DEFAULT_WINDOW_DAYS),
            location: ALL_SELECTION.to_string(),
            granularity: Granularity::Month,
        }
    }

    pub fn peers(mut self, peers: PeerSelection) -> Self {
        self.peers = peers;
        self
    }

    pub fn window(mut self, window: DateWindow) -> Self {
        self.window = window;
        self
    }

    pub fn location<S: Into<String>>(mut self, location: S) -> Self {
        self.location = location.into();
        self
    }

    pub fn granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = granularity;
        self
    }
}

/// One provider's metrics in a listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderSummary {
    pub provider_id: ProviderId,
    pub provider_name: String,
    pub metrics: EntityMetrics,
    pub outstanding_ratio: Option<f64>,
}

/// A point of a subject-versus-peers series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonPoint {
    pub period: String,
    pub subject: f64,
    pub peer_average: f64,
}

/// A point of a single series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub period: String,
    pub value: f64,
}

/// Procedure count for one code prefix
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MixEntry {
    pub prefix: String,
    pub count: usize,
}

/// Provider against peers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderAnalysisView {
    pub provider_id: ProviderId,
    pub provider_name: String,
    pub peer_ids: Vec<ProviderId>,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub location: String,
    pub subject: EntityMetrics,
    pub peer_average: EntityMetrics,
    pub deltas: MetricDeltas,
    pub subject_outstanding_ratio: Option<f64>,
    pub peer_outstanding_ratio: Option<f64>,
    pub procedure_series: Vec<ComparisonPoint>,
    pub billing_series: Vec<ComparisonPoint>,
    pub procedure_mix: Vec<MixEntry>,
    pub trend: Trend,
    pub insight: String,
}

/// Money totals of a set of bills
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct FinancialTotals {
    pub claims: usize,
    pub revenue: f64,
    pub received: f64,
    pub outstanding: f64,
    pub medical_aid_received: f64,
    pub patient_received: f64,
    /// Medical-aid payments as a percentage of billed; 0 when nothing was billed
    pub medical_aid_share: f64,
}

impl FinancialTotals {
    pub fn from_bills(bills: &[&BillingRecord]) -> Self {
        let mut totals = Self { claims: bills.len(), ..Default::default() };
        for bill in bills {
            totals.revenue += bill.billed_amount;
            totals.outstanding += bill.outstanding_amount;
            totals.medical_aid_received += bill.paid_medical_aid;
            totals.patient_received += bill.paid_patient;
            totals.received += bill.total_paid();
        }
        totals.medical_aid_share = share_of(totals.medical_aid_received, totals.revenue);
        totals
    }
}

/// Changes against the previous window of the same length
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PeriodChanges {
    pub revenue: Delta,
    pub received: Delta,
    pub outstanding: Delta,
    /// Percentage points
    pub medical_aid_share_change: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceShare {
    pub source: PaymentSource,
    pub label: String,
    pub amount: f64,
    /// Percentage of everything received
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DelayDistribution {
    pub source: PaymentSource,
    pub buckets: Vec<BucketCount>,
}

/// A claim with money still owed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutstandingClaim {
    pub procedure_record_id: Option<ProcedureRecordId>,
    pub patient_name: String,
    pub procedure_description: Option<String>,
    pub date_billed: Option<NaiveDate>,
    pub billed_amount: f64,
    pub outstanding_amount: f64,
    /// `Medical Aid` until the medical aid has paid, then `Patient`
    pub responsible_party: String,
}

/// Financial analysis of a window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinancialView {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub totals: FinancialTotals,
    pub previous_totals: FinancialTotals,
    pub changes: PeriodChanges,
    pub claim_sizes: Vec<BucketCount>,
    pub payment_sources: Vec<SourceShare>,
    pub payment_delays: Vec<DelayDistribution>,
    pub revenue_series: Vec<SeriesPoint>,
    pub outstanding_claims: Vec<OutstandingClaim>,
    pub insight: String,
}

/// Periods offered for MBT scenarios
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioPeriod {
    #[default]
    Last30Days,
    Last90Days,
    LastYear,
    #[serde(rename = "ytd")]
    YearToDate,
}

impl ScenarioPeriod {
    pub const ALL: [ScenarioPeriod; 4] = [
        ScenarioPeriod::Last30Days,
        ScenarioPeriod::Last90Days,
        ScenarioPeriod::LastYear,
        ScenarioPeriod::YearToDate,
    ];

    pub fn window(&self, as_of: NaiveDate) -> DateWindow {
        match self {
            ScenarioPeriod::Last30Days => DateWindow::TrailingDays(30),
            ScenarioPeriod::Last90Days => DateWindow::TrailingDays(90),
            ScenarioPeriod::LastYear => DateWindow::TrailingDays(365),
            ScenarioPeriod::YearToDate => DateWindow::year_to_date(as_of),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ScenarioPeriod::Last30Days => "Last 30 Days",
            ScenarioPeriod::Last90Days => "Last 90 Days",
            ScenarioPeriod::LastYear => "Last Year",
            ScenarioPeriod::YearToDate => "Year to Date",
        }
    }

    /// Parse `last30days`, `last90days`, `lastyear` or `ytd`
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "last30days" => Some(ScenarioPeriod::Last30Days),
            "last90days" => Some(ScenarioPeriod::Last90Days),
            "lastyear" => Some(ScenarioPeriod::LastYear),
            "ytd" => Some(ScenarioPeriod::YearToDate),
            _ => None,
        }
    }
}

/// Current state of one procedure description
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcedureBaseline {
    pub description: String,
    /// Average MBT percentage over billing rows in the period
    pub current_mbt: f64,
    /// Average billed amount over billing rows in the period
    pub average_cost: f64,
    /// Procedures served in the period
    pub procedure_count: f64,
}

/// New MBT (and optionally count) for one procedure description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioAdjustment {
    pub description: String,
    pub new_mbt: f64,
    #[serde(default)]
    pub procedure_count: Option<f64>,
}

/// A named set of adjustments
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub adjustments: Vec<ScenarioAdjustment>,
}

impl Scenario {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self { name: name.into(), adjustments: Vec::new() }
    }

    /// Set the MBT of a procedure description
    pub fn with_mbt<S: Into<String>>(mut self, description: S, new_mbt: f64) -> Self {
        self.adjustments.push(ScenarioAdjustment {
            description: description.into(),
            new_mbt,
            procedure_count: None,
        });
        self
    }

    /// Last adjustment for a description
    pub fn adjustment_for(&self, description: &str) -> Option<&ScenarioAdjustment> {
        self.adjustments.iter().rev().find(|a| a.description == description)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioLine {
    #[serde(flatten)]
    pub baseline: ProcedureBaseline,
    pub new_mbt: f64,
    pub scenario_count: f64,
    pub base_revenue: f64,
    pub scenario_revenue: f64,
}

/// MBT scenario against the baseline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioView {
    pub name: String,
    pub period: ScenarioPeriod,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub lines: Vec<ScenarioLine>,
    pub total_base: f64,
    pub total_scenario: f64,
    pub difference: f64,
    pub change: Delta,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentPatient {
    pub patient_id: PatientId,
    pub patient_name: String,
    pub provider_name: String,
    pub location_name: String,
    pub procedure_description: Option<String>,
    pub last_visit: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentPatientsView {
    pub as_of: NaiveDate,
    pub patients: Vec<RecentPatient>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn procedure(id: &str, patient: &str, provider: &str, served: NaiveDate, description: &str) -> ProcedureRecord {
        ProcedureRecord {
            record_id: ProcedureRecordId::from(id),
            patient_id: PatientId::from(patient),
            provider_id: ProviderId::from(provider),
            location_id: Some(LocationId::from("L1")),
            code: Some("0190".to_string()),
            description: Some(description.to_string()),
            date_of_service: Some(served),
        }
    }

    fn bill(id: &str, billed: f64, outstanding: f64, billed_on: NaiveDate) -> BillingRecord {
        BillingRecord {
            procedure_record_id: Some(ProcedureRecordId::from(id)),
            billed_amount: billed,
            outstanding_amount: outstanding,
            paid_medical_aid: billed - outstanding,
            paid_patient: 0.0,
            date_billed: Some(billed_on),
            date_paid_medical_aid: None,
            date_paid_patient: None,
            mbt_percentage: 100.0,
        }
    }

    fn doctor(id: &str, name: &str) -> DoctorRecord {
        DoctorRecord { provider_id: ProviderId::from(id), name: name.to_string() }
    }

    fn practice() -> PracticeDataset {
        let d = date(2024, 6, 1);
        let procedures = vec![
            procedure("1", "P1", "D1", d, "Consult"),
            procedure("2", "P2", "D1", d, "Consult"),
            procedure("3", "P3", "D2", d, "Consult"),
            procedure("4", "P4", "D2", d, "Scope"),
            procedure("5", "P5", "D3", d, "Scope"),
            procedure("6", "P5", "D3", d, "Scope"),
        ];
        let billing = vec![
            bill("1", 1000.0, 100.0, d),
            bill("2", 2000.0, 0.0, d),
            bill("3", 1000.0, 0.0, d),
            bill("4", 500.0, 0.0, d),
            bill("5", 1000.0, 0.0, d),
            bill("6", 500.0, 0.0, d),
        ];
        let doctors = vec![doctor("D1", "Dr. Naidoo"), doctor("D2", "Dr. Botha"), doctor("D3", "Dr. Khumalo")];
        PracticeDataset::new(Vec::new(), procedures, billing, doctors, Vec::new())
    }

    #[test]
    fn test_provider_analysis_against_all_others() {
        let dataset = practice();
        let analytics = dataset.analytics(date(2024, 6, 30));
        let view = analytics.provider_analysis(&ProviderAnalysisRequest::new(ProviderId::from("D1")));

        assert_eq!(view.provider_name, "Dr. Naidoo");
        assert_eq!(view.peer_ids.len(), 2);
        assert_eq!(view.subject.total_billed, 3000.0);
        assert_eq!(view.peer_average.total_billed, 1500.0);
        assert_eq!(view.peer_average.procedure_count, 2.0);
        assert_eq!(view.peer_average.unique_patients, 1.5);
        assert_eq!(view.deltas.billed.percent(), Some(100.0));

        assert_eq!(view.procedure_series.len(), 1);
        assert_eq!(view.procedure_series[0].period, "2024-06");
        assert_eq!(view.procedure_series[0].subject, 2.0);
        assert_eq!(view.procedure_series[0].peer_average, 2.0);
        assert_eq!(view.billing_series[0].peer_average, 1500.0);
        assert_eq!(view.procedure_mix, vec![MixEntry { prefix: "0".to_string(), count: 2 }]);
        assert!(view.insight.starts_with("Dr. Naidoo's performance analysis: "));
    }

    #[test]
    fn test_billing_series_follows_billed_date() {
        let mut dataset = practice();
        dataset.procedures[0].date_of_service = Some(date(2024, 5, 20));
        dataset.billing[0].date_billed = Some(date(2024, 6, 5));
        dataset.build_indexes();
        let analytics = dataset.analytics(date(2024, 6, 30));
        let view = analytics.provider_analysis(&ProviderAnalysisRequest::new(ProviderId::from("D1")));

        let periods: Vec<&str> = view.billing_series.iter().map(|p| p.period.as_str()).collect();
        assert_eq!(periods, vec!["2024-05", "2024-06"]);
        assert_eq!(view.billing_series[0].subject, 0.0);
        assert_eq!(view.billing_series[1].subject, 3000.0);
        assert_eq!(view.procedure_series[0].subject, 1.0);
        assert_eq!(view.procedure_series[1].subject, 1.0);
    }

    #[test]
    fn test_billing_only_month_joins_procedure_axis() {
        let mut dataset = practice();
        dataset.billing[0].date_billed = Some(date(2024, 7, 2));
        dataset.build_indexes();
        let analytics = dataset.analytics(date(2024, 6, 30));
        let view = analytics.provider_analysis(&ProviderAnalysisRequest::new(ProviderId::from("D1")));

        let periods: Vec<&str> = view.procedure_series.iter().map(|p| p.period.as_str()).collect();
        assert_eq!(periods, vec!["2024-06", "2024-07"]);
        assert_eq!(view.procedure_series[1].subject, 0.0);
        assert_eq!(view.billing_series[1].subject, 1000.0);
    }

    #[test]
    fn test_explicit_peers_and_location() {
        let dataset = practice();
        let analytics = dataset.analytics(date(2024, 6, 30));
        let request = ProviderAnalysisRequest::new(ProviderId::from("D1"))
            .peers(PeerSelection::Explicit(vec![ProviderId::from("D3")]))
            .location("L2");
        let view = analytics.provider_analysis(&request);

        assert_eq!(view.peer_ids, vec![ProviderId::from("D3")]);
        assert_eq!(view.subject.procedure_count, 0.0);
        assert_eq!(view.insight, INSUFFICIENT_DATA);
    }

    #[test]
    fn test_unknown_provider_renders_placeholder() {
        let mut dataset = practice();
        dataset.procedures.push(procedure("7", "P9", "D404", date(2024, 6, 2), "Consult"));
        dataset.build_indexes();
        let analytics = dataset.analytics(date(2024, 6, 30));

        let summaries = analytics.provider_summaries(DateWindow::TrailingDays(90), "all");
        let unknown = summaries.iter().find(|s| s.provider_id.as_str() == "D404").unwrap();
        assert_eq!(unknown.provider_name, UNASSIGNED_PROVIDER);
        assert_eq!(unknown.metrics.procedure_count, 1.0);

        let recent = analytics.recent_patients(10);
        let visit = recent.patients.iter().find(|p| p.patient_id.as_str() == "P9").unwrap();
        assert_eq!(visit.provider_name, UNASSIGNED_PROVIDER);
        assert_eq!(visit.patient_name, UNKNOWN_PATIENT);
        assert_eq!(visit.location_name, UNKNOWN_LOCATION);
    }

    #[test]
    fn test_financial_view() {
        let mut dataset = practice();
        dataset.billing[0].date_paid_medical_aid = Some(date(2024, 6, 10));
        dataset.billing.push(bill("old", 4500.0, 0.0, date(2024, 5, 15)));
        let analytics = dataset.analytics(date(2024, 6, 30));

        let view = analytics.financial(DateWindow::TrailingDays(30), 25);
        assert_eq!(view.totals.claims, 6);
        assert_eq!(view.totals.revenue, 6000.0);
        assert_eq!(view.totals.outstanding, 100.0);
        assert_eq!(view.previous_totals.revenue, 4500.0);
        assert!(view.changes.revenue.is_defined_and(|d| (d - 33.333).abs() < 0.01));

        let aid = &view.payment_delays[0];
        assert_eq!(aid.source, PaymentSource::MedicalAid);
        let eight_to_fourteen = aid.buckets.iter().find(|b| b.label == "8-14").unwrap();
        assert_eq!(eight_to_fourteen.count, 1);
        assert_eq!(aid.buckets.iter().map(|b| b.count).sum::<usize>(), 1);

        assert_eq!(view.outstanding_claims.len(), 1);
        assert_eq!(view.outstanding_claims[0].responsible_party, "Patient");
        assert_eq!(view.outstanding_claims[0].patient_name, UNKNOWN_PATIENT);
        assert_eq!(view.claim_sizes.iter().map(|b| b.count).sum::<usize>(), 6);
        assert!(view.insight.starts_with("Positive financial trend detected."));
    }

    #[test]
    fn test_financial_view_of_empty_dataset() {
        let dataset = PracticeDataset::default();
        let view = dataset.analytics(date(2024, 6, 30)).financial(DateWindow::TrailingDays(30), 25);

        assert_eq!(view.totals, FinancialTotals::default());
        assert_eq!(view.changes.revenue, Delta::Undefined);
        assert_eq!(view.totals.medical_aid_share, 0.0);
        assert!(view.outstanding_claims.is_empty());
    }

    #[test]
    fn test_financial_view_with_oversized_window() {
        let dataset = practice();
        let view = dataset.analytics(date(2024, 6, 30)).financial(DateWindow::TrailingDays(90_000_000), 5);

        assert_eq!(view.totals.claims, 6);
        assert_eq!(view.totals.received, 5900.0);
        assert_eq!(view.previous_totals, FinancialTotals::default());
    }

    #[test]
    fn test_scenario_modelling() {
        let mut dataset = practice();
        dataset.billing[4].mbt_percentage = 0.0;
        dataset.billing[5].mbt_percentage = 0.0;
        let analytics = dataset.analytics(date(2024, 6, 30));

        let baseline = analytics.scenario_baseline(ScenarioPeriod::Last30Days);
        let consult = baseline.iter().find(|b| b.description == "Consult").unwrap();
        assert_eq!(consult.procedure_count, 3.0);
        assert_eq!(consult.average_cost, 4000.0 / 3.0);
        assert_eq!(consult.current_mbt, 100.0);

        let scenario = Scenario::new("Raise consults").with_mbt("Consult", 120.0).with_mbt("Scope", 150.0);
        let view = analytics.model_scenario(ScenarioPeriod::Last30Days, &scenario);

        let consult = view.lines.iter().find(|l| l.baseline.description == "Consult").unwrap();
        assert!((consult.base_revenue - 4000.0).abs() < 1e-9);
        assert!((consult.scenario_revenue - 4800.0).abs() < 1e-9);

        // Scope averages MBT 100 and 0 over its three rows
        let scope = view.lines.iter().find(|l| l.baseline.description == "Scope").unwrap();
        assert!((scope.baseline.current_mbt - 100.0 / 3.0).abs() < 1e-9);
        assert!(view.change.is_defined_and(|d| d > 0.0));
        assert_eq!(view.difference, view.total_scenario - view.total_base);
    }

    #[test]
    fn test_scenario_with_zero_current_mbt_keeps_base() {
        let mut dataset = practice();
        for bill in &mut dataset.billing {
            bill.mbt_percentage = 0.0;
        }
        let analytics = dataset.analytics(date(2024, 6, 30));
        let view = analytics.model_scenario(ScenarioPeriod::YearToDate, &Scenario::new("x").with_mbt("Scope", 200.0));

        assert_eq!(view.total_base, view.total_scenario);
        assert!(view.change.is_defined_and(|d| d == 0.0));
    }

    #[test]
    fn test_recent_patients_distinct_and_limited() {
        let mut dataset = practice();
        dataset.procedures.push(procedure("8", "P1", "D2", date(2024, 6, 20), "Scope"));
        dataset.procedures.push(procedure("9", "P7", "D2", date(2024, 7, 20), "Scope"));
        dataset.build_indexes();
        let view = dataset.analytics(date(2024, 6, 30)).recent_patients(3);

        assert_eq!(view.patients.len(), 3);
        assert_eq!(view.patients[0].patient_id.as_str(), "P1");
        assert_eq!(view.patients[0].last_visit, Some(date(2024, 6, 20)));
        assert_eq!(view.patients[0].provider_name, "Dr. Botha");
        // Future visit is past the as-of date
        assert!(view.patients.iter().all(|p| p.patient_id.as_str() != "P7"));
    }

    #[test]
    fn test_scenario_period_names() {
        for period in ScenarioPeriod::ALL {
            let json = serde_json::to_value(period).unwrap();
            assert_eq!(ScenarioPeriod::from_name(json.as_str().unwrap()), Some(period));
        }
    }
}
