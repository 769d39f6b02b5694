/*!
 * End-to-end tests: CSV files on disk through the dataset builder to every view
 */

use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use practice_analytics::constants::{UNASSIGNED_PROVIDER, UNKNOWN_LOCATION};
use practice_analytics::export::{select_field, to_value, CsvExporter, ViewExporter};
use practice_analytics::prelude::*;
use tempfile::TempDir;

const DOCTORS: &str = "Provider ID,Provider Name
D1,Dr. Mokoena
D2,Dr. Pillay
D3,Dr. van Wyk
";

const HOSPITALS: &str = "Location ID,Location Name
L1,Sandton Clinic
L2,Rosebank Day Hospital
";

const PATIENTS: &str = "Patient ID,Patient First Name,Patient Last Name
P1,Thandi,Nkosi
P2,Johan,Botha
P3,Ayesha,Patel
P4,Sipho,Dube
P5,Megan,Smith
";

const PROCEDURES: &str = "Procedure Record ID,Patient ID,Provider ID,Location ID,Procedure Code,Procedure Description,Date of Service
PR1,P1,D1,L1,0190,Consultation,2024-03-10
PR2,P2,D1,L1,0190,Consultation,2024-05-12
PR3,P3,D2,L1,0191,Consultation,2024-03-15
PR4,P4,D2,L2,8101,Extraction,2024-04-20
PR5,P5,D3,L2,0190,Consultation,2024-05-02
PR6,P5,D3,L2,8101,Extraction,2024-06-01
PR7,P1,D9,L1,,Review,2024-06-20
";

const BILLING: &str = "Procedure Record ID,Billed Amount,Outstanding Amount,Amount Paid - Medical Aid,Amount Paid - Patient,Date Billed / Claim Submit Date,Date Paid - Medical Aid,Date Paid - Patient,MBT Percentage
PR1,1000,100,800,100,2024-03-11,2024-03-20,,100
PR2,2000,0,1500,500,2024-05-13,2024-05-30,2024-06-02,100
PR3,1000,0,1000,0,2024-03-16,2024-03-18,,100
PR4,500,0,400,100,2024-04-21,2024-04-25,2024-04-25,80
PR5,1000,0,1000,0,2024-05-03,2024-05-10,,100
PR6,500,0,500,0,2024-06-02,2024-06-04,,80
PR7,300,300,0,0,2024-06-21,,,100
";

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
}

fn write_practice(dir: &Path, with_hospitals: bool) {
    fs::write(dir.join("doctors.csv"), DOCTORS).unwrap();
    fs::write(dir.join("patients.csv"), PATIENTS).unwrap();
    fs::write(dir.join("procedures.csv"), PROCEDURES).unwrap();
    fs::write(dir.join("billing.csv"), BILLING).unwrap();
    if with_hospitals {
        fs::write(dir.join("hospitals.csv"), HOSPITALS).unwrap();
    }
}

fn load_practice(with_hospitals: bool) -> (TempDir, PracticeDataset) {
    let dir = tempfile::tempdir().unwrap();
    write_practice(dir.path(), with_hospitals);
    let dataset = PracticeDatasetBuilder::new()
        .data_dir(dir.path())
        .parallel(true)
        .build()
        .unwrap();
    (dir, dataset)
}

const BILLING_HEADER: &str = "Procedure Record ID,Billed Amount,Outstanding Amount,Amount Paid - Medical Aid,Amount Paid - Patient,Date Billed / Claim Submit Date,Date Paid - Medical Aid,Date Paid - Patient,MBT Percentage";

const PROCEDURE_HEADER: &str = "Procedure Record ID,Patient ID,Provider ID,Location ID,Procedure Code,Procedure Description,Date of Service";

/// Practice with the shared reference tables and the given procedure and billing rows
fn load_with_rows(procedures: &[&str], billing: &[&str]) -> (TempDir, PracticeDataset) {
    let dir = tempfile::tempdir().unwrap();
    write_practice(dir.path(), true);
    let table = |header: &str, rows: &[&str]| format!("{}\n{}\n", header, rows.join("\n"));
    fs::write(dir.path().join("procedures.csv"), table(PROCEDURE_HEADER, procedures)).unwrap();
    fs::write(dir.path().join("billing.csv"), table(BILLING_HEADER, billing)).unwrap();

    let dataset = PracticeDatasetBuilder::new()
        .data_dir(dir.path())
        .parallel(false)
        .build()
        .unwrap();
    (dir, dataset)
}

#[test]
fn test_dataset_loads_every_resource() {
    let (_dir, dataset) = load_practice(true);

    assert_eq!(dataset.status(), DatasetStatus::Ready);
    let stats = dataset.statistics();
    assert_eq!(stats.procedures, 7);
    assert_eq!(stats.billing_rows, 7);
    assert_eq!(stats.procedures_with_unknown_provider, 1);
    assert_eq!(stats.procedures_without_billing, 0);
    assert!(stats.load_issues.is_empty());
}

#[test]
fn test_provider_against_all_other_doctors() {
    let (_dir, dataset) = load_practice(true);
    let request = ProviderAnalysisRequest::new(ProviderId::from("D1"));
    let view = dataset.analytics(as_of()).provider_analysis(&request);

    assert_eq!(view.provider_name, "Dr. Mokoena");
    assert_eq!(view.peer_ids, vec![ProviderId::from("D2"), ProviderId::from("D3")]);

    assert_eq!(view.subject.total_billed, 3000.0);
    assert_eq!(view.subject.total_outstanding, 100.0);
    assert_eq!(view.subject.procedure_count, 2.0);
    assert_eq!(view.subject.unique_patients, 2.0);

    assert_eq!(view.peer_average.total_billed, 1500.0);
    assert_eq!(view.peer_average.procedure_count, 2.0);
    assert_eq!(view.peer_average.unique_patients, 1.5);
    assert_eq!(view.deltas.billed.percent(), Some(100.0));
    assert_eq!(view.deltas.outstanding, Delta::Undefined);

    let periods: Vec<&str> = view.procedure_series.iter().map(|p| p.period.as_str()).collect();
    assert_eq!(periods, vec!["2024-03", "2024-04", "2024-05", "2024-06"]);
    assert_eq!(view.procedure_series[0].subject, 1.0);
    assert_eq!(view.procedure_series[0].peer_average, 0.5);
    assert_eq!(view.billing_series[2].subject, 2000.0);
    assert_eq!(view.trend, Trend::Stable);

    assert_eq!(view.procedure_mix.len(), 1);
    assert_eq!(view.procedure_mix[0].prefix, "0");
    assert_eq!(view.procedure_mix[0].count, 2);

    assert!(view.insight.starts_with("Dr. Mokoena's performance analysis: "));
}

#[test]
fn test_provider_at_one_location_with_chosen_peer() {
    let (_dir, dataset) = load_practice(true);
    let request = ProviderAnalysisRequest::new(ProviderId::from("D2"))
        .peers(PeerSelection::Explicit(vec![ProviderId::from("D3")]))
        .location("L2")
        .granularity(Granularity::Week);
    let view = dataset.analytics(as_of()).provider_analysis(&request);

    assert_eq!(view.subject.procedure_count, 1.0);
    assert_eq!(view.subject.total_billed, 500.0);
    assert_eq!(view.peer_average.procedure_count, 2.0);
    assert_eq!(view.deltas.procedures.percent(), Some(-50.0));
    assert!(view.procedure_series.iter().all(|p| p.period.contains("-W")));
}

#[test]
fn test_unknown_provider_gets_placeholder() {
    let (_dir, dataset) = load_practice(true);
    let summaries = dataset.analytics(as_of()).provider_summaries(DateWindow::TrailingDays(180), "all");

    let unknown = summaries.iter().find(|s| s.provider_id.as_str() == "D9").unwrap();
    assert_eq!(unknown.provider_name, UNASSIGNED_PROVIDER);
    assert_eq!(unknown.metrics.total_outstanding, 300.0);
    assert_eq!(summaries.len(), 4);
}

#[test]
fn test_financial_view() {
    let (_dir, dataset) = load_practice(true);
    let view = dataset.analytics(as_of()).financial(DateWindow::TrailingDays(180), 25);

    assert_eq!(view.totals.claims, 7);
    assert_eq!(view.totals.revenue, 6300.0);
    assert_eq!(view.totals.outstanding, 400.0);
    assert_eq!(view.totals.medical_aid_received, 5200.0);
    assert_eq!(view.totals.patient_received, 700.0);
    assert_eq!(view.totals.received, 5900.0);

    // Nothing was billed in the preceding 180 days
    assert_eq!(view.changes.revenue, Delta::Undefined);
    assert!(view.insight.contains("No previous period is available for comparison."));

    let medical_aid = &view.payment_delays[0];
    assert_eq!(medical_aid.source, PaymentSource::MedicalAid);
    let counts: Vec<(&str, usize)> = medical_aid.buckets.iter().map(|b| (b.label.as_str(), b.count)).collect();
    assert_eq!(counts, vec![("0-7", 4), ("8-14", 1), ("15-30", 1), ("31-60", 0), ("60+", 0)]);

    assert_eq!(view.claim_sizes[0].label, "0-2500");
    assert_eq!(view.claim_sizes[0].count, 7);

    assert_eq!(view.outstanding_claims.len(), 2);
    let newest = &view.outstanding_claims[0];
    assert_eq!(newest.procedure_record_id, Some(ProcedureRecordId::from("PR7")));
    assert_eq!(newest.patient_name, "Thandi Nkosi");
    assert_eq!(newest.responsible_party, "Medical Aid");
    assert_eq!(view.outstanding_claims[1].responsible_party, "Patient");
}

#[test]
fn test_scenario_raises_consultation_tariff() {
    let (_dir, dataset) = load_practice(true);
    let analytics = dataset.analytics(as_of());

    let baseline = analytics.scenario_baseline(ScenarioPeriod::LastYear);
    let consultation = baseline.iter().find(|b| b.description == "Consultation").unwrap();
    assert_eq!(consultation.current_mbt, 100.0);
    assert_eq!(consultation.average_cost, 1250.0);
    assert_eq!(consultation.procedure_count, 4.0);

    let scenario = Scenario::new("Consult uplift").with_mbt("Consultation", 150.0);
    let view = analytics.model_scenario(ScenarioPeriod::LastYear, &scenario);

    assert_eq!(view.total_base, 6300.0);
    assert_eq!(view.total_scenario, 8800.0);
    assert_eq!(view.difference, 2500.0);
    let change = view.change.percent().unwrap();
    assert!((change - 39.682_539_682_539_68).abs() < 1e-9);
}

#[test]
fn test_recent_patients_are_distinct() {
    let (_dir, dataset) = load_practice(true);
    let view = dataset.analytics(as_of()).recent_patients(3);

    let ids: Vec<&str> = view.patients.iter().map(|p| p.patient_id.as_str()).collect();
    assert_eq!(ids, vec!["P1", "P5", "P2"]);
    assert_eq!(view.patients[0].provider_name, UNASSIGNED_PROVIDER);
    assert_eq!(view.patients[1].location_name, "Rosebank Day Hospital");
}

#[test]
fn test_missing_resource_degrades_to_placeholders() {
    let (_dir, dataset) = load_practice(false);

    assert_eq!(dataset.status(), DatasetStatus::Partial);
    assert_eq!(dataset.load_issues.len(), 1);
    assert_eq!(dataset.load_issues[0].resource, Resource::Hospitals);

    let view = dataset.analytics(as_of()).recent_patients(5);
    assert!(view.patients.iter().all(|p| p.location_name == UNKNOWN_LOCATION));
}

#[test]
fn test_series_export_to_csv() {
    let (dir, dataset) = load_practice(true);
    let view = dataset.analytics(as_of()).provider_analysis(&ProviderAnalysisRequest::new(ProviderId::from("D1")));

    let value = to_value(&view).unwrap();
    let series = select_field(&value, "procedure_series").unwrap();
    let path = dir.path().join("series.csv");
    CsvExporter::new().export(series, &path).unwrap();

    let written = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = written.lines().collect();
    assert_eq!(lines[0], "period,subject,peer_average");
    assert_eq!(lines[1], "2024-03,1.0,0.5");
    assert_eq!(lines.len(), 5);
}

#[test]
fn test_provider_with_rising_volume() {
    let (_dir, dataset) = load_with_rows(
        &[
            "T1,P1,D1,L1,0190,Consultation,2024-03-05",
            "T2,P2,D1,L1,0190,Consultation,2024-04-05",
            "T3,P3,D1,L1,0190,Consultation,2024-05-05",
            "T4,P4,D1,L1,0190,Consultation,2024-05-06",
            "T5,P5,D1,L1,0190,Consultation,2024-05-07",
            "T6,P1,D1,L1,0190,Consultation,2024-06-05",
            "T7,P2,D1,L1,0190,Consultation,2024-06-06",
            "T8,P3,D1,L1,0190,Consultation,2024-06-07",
            "T9,P4,D2,L1,0190,Consultation,2024-04-10",
        ],
        &[
            "T1,1000,0,1000,0,2024-03-05,,,100",
            "T2,1000,0,1000,0,2024-04-05,,,100",
            "T3,1000,0,1000,0,2024-05-05,,,100",
            "T4,1000,0,1000,0,2024-05-06,,,100",
            "T5,1000,0,1000,0,2024-05-07,,,100",
            "T6,1000,0,1000,0,2024-06-05,,,100",
            "T7,1000,0,1000,0,2024-06-06,,,100",
            "T8,1000,0,1000,0,2024-06-07,,,100",
            "T9,1000,0,1000,0,2024-04-10,,,100",
        ],
    );
    let view = dataset.analytics(as_of()).provider_analysis(&ProviderAnalysisRequest::new(ProviderId::from("D1")));

    let volume: Vec<f64> = view.procedure_series.iter().map(|p| p.subject).collect();
    assert_eq!(volume, vec![1.0, 1.0, 3.0, 3.0]);
    assert_eq!(view.trend, Trend::Increasing);
    assert!(view.insight.contains("Procedure volume has been increasing over the selected period."));
}

#[test]
fn test_billing_series_uses_claim_month() {
    let (_dir, dataset) = load_with_rows(
        &[
            "B1,P1,D1,L1,0190,Consultation,2024-05-28",
            "B2,P2,D1,L1,0190,Consultation,2024-06-10",
            "B3,P3,D1,L1,0190,Consultation,2024-06-29",
            "B4,P4,D2,L1,0190,Consultation,2024-05-15",
        ],
        &[
            "B1,1000,0,1000,0,2024-06-03,,,100",
            "B2,500,0,500,0,2024-06-11,,,100",
            "B3,300,300,0,0,2024-07-01,,,100",
            "B4,800,0,800,0,2024-05-16,,,100",
        ],
    );
    let view = dataset.analytics(as_of()).provider_analysis(&ProviderAnalysisRequest::new(ProviderId::from("D1")));

    let billing: Vec<(&str, f64, f64)> = view.billing_series.iter()
        .map(|p| (p.period.as_str(), p.subject, p.peer_average))
        .collect();
    assert_eq!(billing, vec![("2024-05", 0.0, 400.0), ("2024-06", 1500.0, 0.0), ("2024-07", 300.0, 0.0)]);

    let procedures: Vec<(&str, f64)> = view.procedure_series.iter()
        .map(|p| (p.period.as_str(), p.subject))
        .collect();
    assert_eq!(procedures, vec![("2024-05", 1.0), ("2024-06", 2.0), ("2024-07", 0.0)]);
    assert_eq!(view.subject.total_billed, 1800.0);
}
