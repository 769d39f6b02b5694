/*!
 * Subject versus peer comparison
 *
 * Per-entity metrics over a provider's procedures, a per-peer average over a
 * peer set, and percentage deltas that refuse to produce NaN or infinity.
 */

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::data_types::*;

/// Totals for one entity (or the average peer)
///
/// Counts are floating point because a peer average may be fractional.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct EntityMetrics {
    pub total_billed: f64,
    pub total_outstanding: f64,
    pub procedure_count: f64,
    pub unique_patients: f64,
}

impl EntityMetrics {
    /// Outstanding as a percentage of billed, `None` when nothing was billed
    pub fn outstanding_ratio(&self) -> Option<f64> {
        let ratio = self.total_outstanding / self.total_billed * 100.0;
        (self.total_billed > 0.0 && ratio.is_finite()).then_some(ratio)
    }

    fn add(&mut self, other: &EntityMetrics) {
        self.total_billed += other.total_billed;
        self.total_outstanding += other.total_outstanding;
        self.procedure_count += other.procedure_count;
        self.unique_patients += other.unique_patients;
    }

    fn scaled(&self, divisor: f64) -> EntityMetrics {
        EntityMetrics {
            total_billed: self.total_billed / divisor,
            total_outstanding: self.total_outstanding / divisor,
            procedure_count: self.procedure_count / divisor,
            unique_patients: self.unique_patients / divisor,
        }
    }
}

/// Metrics over a set of procedures
///
/// Amounts come from each procedure's billing row; procedures without one
/// still count towards procedures and patients.
pub fn entity_metrics<'a, 'b, I, F>(procedures: I, billing_of: F) -> EntityMetrics
where
    I: IntoIterator<Item = &'a ProcedureRecord>,
    F: Fn(&ProcedureRecord) -> Option<&'b BillingRecord>,
{
    let mut metrics = EntityMetrics::default();
    let mut patients: HashSet<&PatientId> = HashSet::new();

    for procedure in procedures {
        metrics.procedure_count += 1.0;
        if !procedure.patient_id.as_str().is_empty() {
            patients.insert(&procedure.patient_id);
        }
        if let Some(bill) = billing_of(procedure) {
            metrics.total_billed += bill.billed_amount;
            metrics.total_outstanding += bill.outstanding_amount;
        }
    }

    metrics.unique_patients = patients.len() as f64;
    metrics
}

/// Average of the peers' metrics: sums divided by the number of peers
///
/// An empty peer set yields zeros.
pub fn peer_average(peers: &[EntityMetrics]) -> EntityMetrics {
    let mut total = EntityMetrics::default();
    for peer in peers {
        total.add(peer);
    }
    total.scaled(peers.len().max(1) as f64)
}

/// Which providers a subject is compared against
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerSelection {
    /// Every known provider except the subject
    #[default]
    AllOthers,
    /// A chosen subset
    Explicit(Vec<ProviderId>),
}

impl PeerSelection {
    /// Peer IDs for a subject, never including the subject itself
    pub fn resolve(&self, subject: &ProviderId, doctors: &[DoctorRecord]) -> Vec<ProviderId> {
        let mut seen = HashSet::new();
        let candidates: Box<dyn Iterator<Item = &ProviderId> + '_> = match self {
            PeerSelection::AllOthers => Box::new(doctors.iter().map(|d| &d.provider_id)),
            PeerSelection::Explicit(ids) => Box::new(ids.iter()),
        };

        candidates
            .filter(|id| *id != subject && !id.as_str().is_empty())
            .filter(|id| seen.insert(*id))
            .cloned()
            .collect()
    }
}

/// Which side of the peer value the subject is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

/// Percentage difference, or a marker that it cannot be computed
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Delta {
    Defined { percent: f64, direction: Direction },
    /// The reference value was 0 or the inputs were not finite
    Undefined,
}

impl Delta {
    pub fn percent(&self) -> Option<f64> {
        match self {
            Delta::Defined { percent, .. } => Some(*percent),
            Delta::Undefined => None,
        }
    }

    pub fn direction(&self) -> Option<Direction> {
        match self {
            Delta::Defined { direction, .. } => Some(*direction),
            Delta::Undefined => None,
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, Delta::Defined { .. })
    }

    /// Whether the delta is defined and satisfies a predicate
    pub fn is_defined_and(&self, f: impl FnOnce(f64) -> bool) -> bool {
        self.percent().map(f).unwrap_or(false)
    }
}

/// `(subject / reference - 1) * 100`
pub fn percentage_delta(subject: f64, reference: f64) -> Delta {
    if reference == 0.0 {
        return Delta::Undefined;
    }

    let percent = (subject / reference - 1.0) * 100.0;
    if !percent.is_finite() {
        return Delta::Undefined;
    }

    let direction = if subject >= reference { Direction::Up } else { Direction::Down };
    Delta::Defined { percent, direction }
}

/// Deltas of every metric against the peer average
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricDeltas {
    pub billed: Delta,
    pub outstanding: Delta,
    pub procedures: Delta,
    pub patients: Delta,
}

impl MetricDeltas {
    pub fn between(subject: &EntityMetrics, peer: &EntityMetrics) -> Self {
        Self {
            billed: percentage_delta(subject.total_billed, peer.total_billed),
            outstanding: percentage_delta(subject.total_outstanding, peer.total_outstanding),
            procedures: percentage_delta(subject.procedure_count, peer.procedure_count),
            patients: percentage_delta(subject.unique_patients, peer.unique_patients),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn procedure(id: &str, patient: &str, provider: &str) -> ProcedureRecord {
        ProcedureRecord {
            record_id: ProcedureRecordId::from(id),
            patient_id: PatientId::from(patient),
            provider_id: ProviderId::from(provider),
            location_id: None,
            code: None,
            description: None,
            date_of_service: None,
        }
    }

    fn bill(id: &str, billed: f64, outstanding: f64) -> BillingRecord {
        BillingRecord {
            procedure_record_id: Some(ProcedureRecordId::from(id)),
            billed_amount: billed,
            outstanding_amount: outstanding,
            paid_medical_aid: 0.0,
            paid_patient: 0.0,
            date_billed: None,
            date_paid_medical_aid: None,
            date_paid_patient: None,
            mbt_percentage: 0.0,
        }
    }

    fn of_provider<'a>(procedures: &'a [ProcedureRecord], id: &'a str) -> impl Iterator<Item = &'a ProcedureRecord> + 'a {
        procedures.iter().filter(move |p| p.provider_id.as_str() == id)
    }

    #[test]
    fn test_subject_against_peer_average() {
        let procedures = vec![
            procedure("1", "P1", "D1"),
            procedure("2", "P2", "D1"),
            procedure("3", "P3", "D2"),
            procedure("4", "P4", "D2"),
            procedure("5", "P5", "D3"),
            procedure("6", "P5", "D3"),
        ];
        let bills = vec![
            bill("1", 1000.0, 100.0),
            bill("2", 2000.0, 0.0),
            bill("3", 1000.0, 0.0),
            bill("4", 500.0, 0.0),
            bill("5", 1000.0, 0.0),
            bill("6", 500.0, 0.0),
        ];
        let by_id: HashMap<&str, &BillingRecord> = bills.iter()
            .map(|b| (b.procedure_record_id.as_ref().unwrap().as_str(), b))
            .collect();
        let billing_of = |p: &ProcedureRecord| by_id.get(p.record_id.as_str()).copied();

        let subject = entity_metrics(of_provider(&procedures, "D1"), billing_of);
        assert_eq!(subject.total_billed, 3000.0);
        assert_eq!(subject.total_outstanding, 100.0);
        assert_eq!(subject.procedure_count, 2.0);
        assert_eq!(subject.unique_patients, 2.0);

        let peers = vec![
            entity_metrics(of_provider(&procedures, "D2"), billing_of),
            entity_metrics(of_provider(&procedures, "D3"), billing_of),
        ];
        let peer = peer_average(&peers);
        assert_eq!(peer.total_billed, 1500.0);
        assert_eq!(peer.procedure_count, 2.0);
        assert_eq!(peer.unique_patients, 1.5);

        let deltas = MetricDeltas::between(&subject, &peer);
        assert_eq!(deltas.billed.percent(), Some(100.0));
        assert_eq!(deltas.billed.direction(), Some(Direction::Up));
        assert_eq!(deltas.procedures.percent(), Some(0.0));
        // Peers have nothing outstanding
        assert_eq!(deltas.outstanding, Delta::Undefined);
    }

    #[test]
    fn test_zero_reference_is_undefined() {
        assert_eq!(percentage_delta(10.0, 0.0), Delta::Undefined);
        assert_eq!(percentage_delta(0.0, 0.0), Delta::Undefined);
        assert_eq!(percentage_delta(f64::NAN, 1.0), Delta::Undefined);
        assert!(percentage_delta(5.0, 10.0).is_defined_and(|p| p == -50.0));
        assert_eq!(percentage_delta(5.0, 10.0).direction(), Some(Direction::Down));
        assert_eq!(percentage_delta(10.0, 10.0).direction(), Some(Direction::Up));
    }

    #[test]
    fn test_undefined_serializes_as_marker() {
        let json = serde_json::to_value(percentage_delta(1.0, 0.0)).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "undefined" }));
    }

    #[test]
    fn test_peer_average_of_nothing_is_zero() {
        let peer = peer_average(&[]);
        assert_eq!(peer, EntityMetrics::default());
        assert_eq!(peer.outstanding_ratio(), None);
    }

    #[test]
    fn test_missing_billing_still_counts_procedure() {
        let procedures = vec![procedure("1", "P1", "D1"), procedure("2", "", "D1")];
        let metrics = entity_metrics(&procedures, |_| None);
        assert_eq!(metrics.procedure_count, 2.0);
        assert_eq!(metrics.unique_patients, 1.0);
        assert_eq!(metrics.total_billed, 0.0);
    }

    #[test]
    fn test_peer_selection_excludes_subject() {
        let doctors = vec![
            DoctorRecord { provider_id: ProviderId::from("D1"), name: "A".to_string() },
            DoctorRecord { provider_id: ProviderId::from("D2"), name: "B".to_string() },
            DoctorRecord { provider_id: ProviderId::from("D2"), name: "B again".to_string() },
        ];
        let subject = ProviderId::from("D1");

        assert_eq!(PeerSelection::AllOthers.resolve(&subject, &doctors), vec![ProviderId::from("D2")]);

        let explicit = PeerSelection::Explicit(vec![ProviderId::from("D1"), ProviderId::from("D7")]);
        assert_eq!(explicit.resolve(&subject, &doctors), vec![ProviderId::from("D7")]);
    }
}
