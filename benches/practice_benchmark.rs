use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use practice_analytics::aggregate::{group_by_key, month_key, time_series};
use practice_analytics::loader::convert_rows;
use practice_analytics::prelude::*;
use std::sync::OnceLock;

const DOCTORS: usize = 40;
const PROCEDURES: usize = 50_000;

static DATASET: OnceLock<PracticeDataset> = OnceLock::new();

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 12, 31).unwrap_or_default()
}

// Deterministic synthetic practice: procedures spread over two years
fn synthetic_dataset(procedures: usize) -> PracticeDataset {
    let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap_or_default();
    let doctors: Vec<DoctorRecord> = (0..DOCTORS)
        .map(|i| DoctorRecord { provider_id: ProviderId::new(format!("D{}", i)), name: format!("Dr. {}", i) })
        .collect();
    let hospitals: Vec<HospitalRecord> = (0..5)
        .map(|i| HospitalRecord { location_id: LocationId::new(format!("L{}", i)), name: Some(format!("Clinic {}", i)) })
        .collect();
    let patients: Vec<PatientRecord> = (0..procedures / 4)
        .map(|i| PatientRecord {
            patient_id: PatientId::new(format!("P{}", i)),
            first_name: Some(format!("First{}", i)),
            last_name: Some(format!("Last{}", i)),
        })
        .collect();

    let mut procedure_rows = Vec::with_capacity(procedures);
    let mut billing_rows = Vec::with_capacity(procedures);
    for i in 0..procedures {
        let served = start + Duration::days((i % 730) as i64);
        let id = ProcedureRecordId::new(format!("PR{}", i));
        procedure_rows.push(ProcedureRecord {
            record_id: id.clone(),
            patient_id: PatientId::new(format!("P{}", (i * 7) % (procedures / 4).max(1))),
            provider_id: ProviderId::new(format!("D{}", i % DOCTORS)),
            location_id: Some(LocationId::new(format!("L{}", i % 5))),
            code: Some(format!("{:04}", (i * 13) % 9000)),
            description: Some(["Consultation", "Extraction", "Filling", "Scale and Polish"][i % 4].to_string()),
            date_of_service: Some(served),
        });
        let billed = 500.0 + (i % 20) as f64 * 450.0;
        let outstanding = if i % 6 == 0 { billed * 0.25 } else { 0.0 };
        billing_rows.push(BillingRecord {
            procedure_record_id: Some(id),
            billed_amount: billed,
            outstanding_amount: outstanding,
            paid_medical_aid: (billed - outstanding) * 0.8,
            paid_patient: (billed - outstanding) * 0.2,
            date_billed: Some(served + Duration::days(1)),
            date_paid_medical_aid: Some(served + Duration::days(3 + (i % 70) as i64)),
            date_paid_patient: (i % 3 == 0).then(|| served + Duration::days(20)),
            mbt_percentage: [100.0, 80.0, 120.0][i % 3],
        });
    }

    PracticeDataset::new(patients, procedure_rows, billing_rows, doctors, hospitals)
}

fn get_dataset() -> &'static PracticeDataset {
    DATASET.get_or_init(|| synthetic_dataset(PROCEDURES))
}

fn benchmark_grouping(c: &mut Criterion) {
    let dataset = get_dataset();
    let mut group = c.benchmark_group("grouping");

    group.bench_function("group_by_provider", |b| {
        b.iter(|| group_by_key(black_box(&dataset.procedures), |p| p.provider_id.clone()))
    });

    group.bench_function("group_by_month", |b| {
        b.iter(|| {
            group_by_key(black_box(&dataset.procedures), |p| {
                p.date_of_service.map(month_key).unwrap_or_default()
            })
        })
    });

    group.bench_function("weekly_billing_series", |b| {
        b.iter(|| {
            time_series(
                black_box(&dataset.billing),
                |bill| bill.date_billed,
                Granularity::Week,
                Reducer::Sum,
                |bill| bill.billed_amount,
            )
        })
    });

    group.finish();
}

fn benchmark_views(c: &mut Criterion) {
    let dataset = get_dataset();
    let analytics = dataset.analytics(as_of());
    let mut group = c.benchmark_group("views");
    group.sample_size(20);

    for days in [30u32, 180, 365] {
        let request = ProviderAnalysisRequest::new(ProviderId::from("D0")).window(DateWindow::TrailingDays(days));
        group.bench_with_input(BenchmarkId::new("provider_analysis", days), &request, |b, request| {
            b.iter(|| analytics.provider_analysis(black_box(request)))
        });
    }

    group.bench_function("financial_180", |b| {
        b.iter(|| analytics.financial(black_box(DateWindow::TrailingDays(180)), 25))
    });

    let scenario = Scenario::new("bench").with_mbt("Consultation", 150.0);
    group.bench_function("scenario_last_year", |b| {
        b.iter(|| analytics.model_scenario(ScenarioPeriod::LastYear, black_box(&scenario)))
    });

    group.finish();
}

fn benchmark_loading(c: &mut Criterion) {
    let mut csv = String::from(
        "Procedure Record ID,Patient ID,Provider ID,Location ID,Procedure Code,Procedure Description,Date of Service\n",
    );
    for i in 0..10_000 {
        csv.push_str(&format!("PR{},P{},D{},L{},{:04},Consultation,2024-{:02}-{:02}\n", i, i % 900, i % 40, i % 5, i % 9000, i % 12 + 1, i % 28 + 1));
    }

    let loader = RecordLoader::new(".");
    let mut group = c.benchmark_group("loading");
    group.sample_size(20);

    group.bench_function("read_procedure_rows", |b| {
        b.iter(|| loader.read_rows(Resource::Procedures, black_box(csv.as_bytes())))
    });

    if let Ok(rows) = loader.read_rows(Resource::Procedures, csv.as_bytes()) {
        group.bench_function("convert_procedure_rows", |b| {
            b.iter(|| convert_rows::<ProcedureRecord>(black_box(&rows), ValidationLevel::Standard))
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_grouping, benchmark_views, benchmark_loading);
criterion_main!(benches);
