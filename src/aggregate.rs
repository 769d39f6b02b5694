/*!
 * Aggregation of practice records
 *
 * Grouping by derived keys (calendar month, ISO week, code prefix, amount or
 * payment-delay bucket) and reduction of groups to sums, counts and averages.
 * Bucket sets are exhaustive: every record lands in exactly one bucket.
 */

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_AMOUNT_EDGES, OTHER_BUCKET};
use crate::data_types::{BillingRecord, PaymentSource};

/// Group records by a derived key
///
/// Groups keep input order and iterate in key order.
pub fn group_by_key<'a, T, I, K, F>(records: I, key_of: F) -> BTreeMap<K, Vec<&'a T>>
where
    I: IntoIterator<Item = &'a T>,
    T: 'a,
    K: Ord,
    F: Fn(&T) -> K,
{
    let mut groups: BTreeMap<K, Vec<&'a T>> = BTreeMap::new();
    for record in records {
        groups.entry(key_of(record)).or_default().push(record);
    }
    groups
}

/// `YYYY-MM`
pub fn month_key(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

/// ISO week-numbering year and week, `YYYY-Www`
pub fn iso_week_key(date: NaiveDate) -> String {
    let week = date.iso_week();
    format!("{:04}-W{:02}", week.year(), week.week())
}

/// First character of a procedure code, `"Other"` when blank
pub fn code_prefix_key(code: Option<&str>) -> String {
    code.map(str::trim)
        .and_then(|c| c.chars().next())
        .map(|c| c.to_string())
        .unwrap_or_else(|| OTHER_BUCKET.to_string())
}

/// Time bucket size for series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Month,
    Week,
}

impl Granularity {
    /// Period key of a date
    pub fn key(&self, date: NaiveDate) -> String {
        match self {
            Granularity::Month => month_key(date),
            Granularity::Week => iso_week_key(date),
        }
    }

    /// Parse a granularity name
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "month" | "monthly" => Some(Granularity::Month),
            "week" | "weekly" => Some(Granularity::Week),
            _ => None,
        }
    }
}

/// How a group collapses to one number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reducer {
    Sum,
    Count,
    /// Sum divided by count; 0 for an empty group
    Average,
}

/// Reduce a group to a scalar
///
/// `value_of` is expected to have coerced unparseable values to 0 already,
/// so such records still count towards `Count` and `Average`.
pub fn reduce_group<T, F>(group: &[&T], reducer: Reducer, value_of: F) -> f64
where
    F: Fn(&T) -> f64,
{
    match reducer {
        Reducer::Count => group.len() as f64,
        Reducer::Sum => group.iter().map(|&record| value_of(record)).sum(),
        Reducer::Average => {
            if group.is_empty() {
                0.0
            } else {
                group.iter().map(|&record| value_of(record)).sum::<f64>() / group.len() as f64
            }
        }
    }
}

/// Reduce every group of a grouping
pub fn reduce_groups<K, T, F>(groups: &BTreeMap<K, Vec<&T>>, reducer: Reducer, value_of: F) -> BTreeMap<K, f64>
where
    K: Ord + Clone,
    F: Fn(&T) -> f64,
{
    groups.iter()
        .map(|(key, group)| (key.clone(), reduce_group(group, reducer, &value_of)))
        .collect()
}

/// Time series of a reduced value; undated records are left out
pub fn time_series<'a, T, I, D, F>(
    records: I,
    date_of: D,
    granularity: Granularity,
    reducer: Reducer,
    value_of: F,
) -> BTreeMap<String, f64>
where
    I: IntoIterator<Item = &'a T>,
    T: 'a,
    D: Fn(&T) -> Option<NaiveDate>,
    F: Fn(&T) -> f64,
{
    let dated = records.into_iter().filter_map(|record| date_of(record).map(|date| (granularity.key(date), record)));

    let mut groups: BTreeMap<String, Vec<&'a T>> = BTreeMap::new();
    for (key, record) in dated {
        groups.entry(key).or_default().push(record);
    }
    reduce_groups(&groups, reducer, value_of)
}

/// Count and total of one bucket
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketCount {
    pub label: String,
    pub count: usize,
    pub total: f64,
}

/// Amount ranges, `[min, max)` with an open-ended last bucket
#[derive(Debug, Clone, PartialEq)]
pub struct AmountBuckets {
    /// Upper bounds of every bucket but the last, ascending
    edges: Vec<f64>,
}

impl Default for AmountBuckets {
    fn default() -> Self {
        Self { edges: DEFAULT_AMOUNT_EDGES.to_vec() }
    }
}

impl AmountBuckets {
    /// Buckets with the given upper bounds; edges are sorted and deduplicated
    pub fn new(mut edges: Vec<f64>) -> Self {
        edges.retain(|e| e.is_finite());
        edges.sort_by(f64::total_cmp);
        edges.dedup();
        Self { edges }
    }

    /// Number of buckets
    pub fn len(&self) -> usize {
        self.edges.len() + 1
    }

    /// Always false; there is at least the open-ended bucket
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Index of the bucket holding an amount
    ///
    /// The first bucket takes everything below its upper bound.
    pub fn bucket_for(&self, amount: f64) -> usize {
        self.edges.iter()
            .position(|&upper| amount < upper)
            .unwrap_or(self.edges.len())
    }

    /// Label of a bucket, e.g. `2500-5000` or `10000+`
    pub fn label(&self, index: usize) -> String {
        let lower = index.min(self.edges.len())
            .checked_sub(1)
            .and_then(|i| self.edges.get(i))
            .copied()
            .unwrap_or(0.0);
        match self.edges.get(index) {
            Some(upper) => format!("{}-{}", lower, upper),
            None => format!("{}+", lower),
        }
    }

    /// Labels of every bucket in order
    pub fn labels(&self) -> Vec<String> {
        (0..self.len()).map(|i| self.label(i)).collect()
    }

    /// Count and total per bucket, including empty buckets
    pub fn distribution<'a, T, I, F>(&self, records: I, amount_of: F) -> Vec<BucketCount>
    where
        I: IntoIterator<Item = &'a T>,
        T: 'a,
        F: Fn(&T) -> f64,
    {
        let mut buckets: Vec<BucketCount> = self.labels()
            .into_iter()
            .map(|label| BucketCount { label, count: 0, total: 0.0 })
            .collect();

        for record in records {
            let amount = amount_of(record);
            let bucket = &mut buckets[self.bucket_for(amount)];
            bucket.count += 1;
            bucket.total += amount;
        }
        buckets
    }
}

/// Payment delay ranges in whole days, inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DelayBucket {
    #[serde(rename = "0-7")]
    UpToWeek,
    #[serde(rename = "8-14")]
    UpToTwoWeeks,
    #[serde(rename = "15-30")]
    UpToMonth,
    #[serde(rename = "31-60")]
    UpToTwoMonths,
    #[serde(rename = "60+")]
    OverTwoMonths,
}

impl DelayBucket {
    pub const ALL: [DelayBucket; 5] = [
        DelayBucket::UpToWeek,
        DelayBucket::UpToTwoWeeks,
        DelayBucket::UpToMonth,
        DelayBucket::UpToTwoMonths,
        DelayBucket::OverTwoMonths,
    ];

    /// Bucket for a delay; negative delays count as paid within a week
    pub fn from_days(days: i64) -> Self {
        match days {
            d if d <= 7 => DelayBucket::UpToWeek,
            d if d <= 14 => DelayBucket::UpToTwoWeeks,
            d if d <= 30 => DelayBucket::UpToMonth,
            d if d <= 60 => DelayBucket::UpToTwoMonths,
            _ => DelayBucket::OverTwoMonths,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DelayBucket::UpToWeek => "0-7",
            DelayBucket::UpToTwoWeeks => "8-14",
            DelayBucket::UpToMonth => "15-30",
            DelayBucket::UpToTwoMonths => "31-60",
            DelayBucket::OverTwoMonths => "60+",
        }
    }
}

impl std::fmt::Display for DelayBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Days from billing to payment by one source, if both dates are known
pub fn payment_delay_days(bill: &BillingRecord, source: PaymentSource) -> Option<i64> {
    let billed = bill.date_billed?;
    let paid = bill.paid_date(source)?;
    Some((paid - billed).num_days())
}

/// Payment-delay histogram for one source
///
/// Bills without both dates are left out rather than counted as unpaid.
pub fn payment_delay_distribution<'a, I>(bills: I, source: PaymentSource) -> Vec<BucketCount>
where
    I: IntoIterator<Item = &'a BillingRecord>,
{
    let mut counts: BTreeMap<DelayBucket, BucketCount> = DelayBucket::ALL
        .iter()
        .map(|b| (*b, BucketCount { label: b.label().to_string(), count: 0, total: 0.0 }))
        .collect();

    for bill in bills {
        if let Some(days) = payment_delay_days(bill, source) {
            if let Some(bucket) = counts.get_mut(&DelayBucket::from_days(days)) {
                bucket.count += 1;
                bucket.total += bill.paid_amount(source);
            }
        }
    }

    counts.into_values().collect()
}
