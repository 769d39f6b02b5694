/*!
 * Filtering and joining of practice records
 *
 * Every filter here is an order-preserving predicate over borrowed records,
 * so filters can be chained in any order with the same result. Joins are
 * equi-joins on foreign keys that keep unmatched left records.
 */

use std::collections::HashMap;
use std::hash::Hash;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::constants::ALL_SELECTION;
use crate::data_types::*;

/// A date window, either trailing from an as-of date or explicit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateWindow {
    /// `[as_of - days, as_of]`
    TrailingDays(u32),
    /// `[start, end]`, both inclusive
    Between { start: NaiveDate, end: NaiveDate },
}

impl DateWindow {
    /// Explicit window between two dates
    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        DateWindow::Between { start, end }
    }

    /// Year to date: January 1st of the as-of year until the as-of date
    pub fn year_to_date(as_of: NaiveDate) -> Self {
        let start = NaiveDate::from_ymd_opt(as_of.year(), 1, 1).unwrap_or(as_of);
        DateWindow::Between { start, end: as_of }
    }

    /// Concrete inclusive bounds
    pub fn resolve(&self, as_of: NaiveDate) -> (NaiveDate, NaiveDate) {
        match *self {
            DateWindow::TrailingDays(days) => (back_from(as_of, Duration::days(i64::from(days))), as_of),
            DateWindow::Between { start, end } => (start, end),
        }
    }

    /// Whether a date lies inside the window
    pub fn contains(&self, date: NaiveDate, as_of: NaiveDate) -> bool {
        let (start, end) = self.resolve(as_of);
        date >= start && date <= end
    }

    /// Window of the same length ending the day before this one starts
    ///
    /// Bounds saturate at the earliest representable date.
    pub fn previous(&self, as_of: NaiveDate) -> DateWindow {
        let (start, end) = self.resolve(as_of);
        let length = end.signed_duration_since(start);
        let prev_end = back_from(start, Duration::days(1));
        DateWindow::Between { start: back_from(prev_end, length), end: prev_end }
    }
}

fn back_from(date: NaiveDate, span: Duration) -> NaiveDate {
    date.checked_sub_signed(span).unwrap_or(NaiveDate::MIN)
}

/// Whether a category selection means "no filtering"
pub fn is_all_selection(selected: &str) -> bool {
    let selected = selected.trim();
    selected.is_empty() || selected.eq_ignore_ascii_case(ALL_SELECTION)
}

/// Keep records whose date lies in the window
///
/// Records without a date are excluded.
pub fn filter_by_date_range<'a, T, I, F>(records: I, date_of: F, window: DateWindow, as_of: NaiveDate) -> Vec<&'a T>
where
    I: IntoIterator<Item = &'a T>,
    T: 'a,
    F: Fn(&T) -> Option<NaiveDate>,
{
    let (start, end) = window.resolve(as_of);
    records.into_iter()
        .filter(|record| {
            date_of(*record)
                .map(|date| date >= start && date <= end)
                .unwrap_or(false)
        })
        .collect()
}

/// Keep records whose field equals the selection
///
/// An empty selection or `"all"` passes every record through.
pub fn filter_by_category<'a, T, I, F>(records: I, field_of: F, selected: &str) -> Vec<&'a T>
where
    I: IntoIterator<Item = &'a T>,
    T: 'a,
    F: Fn(&T) -> Option<&str>,
{
    if is_all_selection(selected) {
        return records.into_iter().collect();
    }

    records.into_iter()
        .filter(|record| field_of(*record) == Some(selected))
        .collect()
}

/// A left record paired with its right-side match, if any
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Joined<'a, L, R> {
    pub left: &'a L,
    pub right: Option<&'a R>,
}

impl<'a, L, R> Joined<'a, L, R> {
    /// The right record, or a caller-supplied default for misses
    pub fn right_or(&self, default: &'a R) -> &'a R {
        self.right.unwrap_or(default)
    }
}

/// Index a slice by key; the first record with a given key wins
pub fn index_by<'a, R, K, F>(records: &'a [R], key_of: F) -> HashMap<K, &'a R>
where
    K: Eq + Hash,
    F: Fn(&R) -> Option<K>,
{
    let mut index = HashMap::with_capacity(records.len());
    for record in records {
        if let Some(key) = key_of(record) {
            index.entry(key).or_insert(record);
        }
    }
    index
}

/// Equi-join that keeps every left record
///
/// Output order follows the left input. Left records without a key or
/// without a match carry `right: None`.
pub fn left_join<'a, L, R, K, I, FL, FR>(
    left: I,
    right: &'a [R],
    left_key: FL,
    right_key: FR,
) -> Vec<Joined<'a, L, R>>
where
    I: IntoIterator<Item = &'a L>,
    L: 'a,
    K: Eq + Hash,
    FL: Fn(&L) -> Option<K>,
    FR: Fn(&R) -> Option<K>,
{
    let index = index_by(right, right_key);
    left.into_iter()
        .map(|l| Joined {
            left: l,
            right: left_key(l).and_then(|k| index.get(&k).copied()),
        })
        .collect()
}

/// Equi-join that substitutes a default for right-side misses
pub fn join_with_default<'a, L, R, K, I, FL, FR>(
    left: I,
    right: &'a [R],
    left_key: FL,
    right_key: FR,
    default: &'a R,
) -> Vec<(&'a L, &'a R)>
where
    I: IntoIterator<Item = &'a L>,
    L: 'a,
    K: Eq + Hash,
    FL: Fn(&L) -> Option<K>,
    FR: Fn(&R) -> Option<K>,
{
    left_join(left, right, left_key, right_key)
        .into_iter()
        .map(|j| (j.left, j.right_or(default)))
        .collect()
}

/// Fluent query over procedure records
///
/// Each method adds an independent predicate; `execute` keeps input order.
pub struct ProcedureQuery<'a> {
    procedures: &'a [ProcedureRecord],
    as_of: NaiveDate,
    filters: Vec<Box<dyn Fn(&ProcedureRecord) -> bool + Send + Sync + 'a>>,
}

impl<'a> ProcedureQuery<'a> {
    /// Create a new query over a procedure table
    pub fn new(procedures: &'a [ProcedureRecord], as_of: NaiveDate) -> Self {
        Self {
            procedures,
            as_of,
            filters: Vec::new(),
        }
    }

    /// Filter by date of service
    pub fn within(mut self, window: DateWindow) -> Self {
        let (start, end) = window.resolve(self.as_of);
        self.filters.push(Box::new(move |p| {
            p.date_of_service
                .map(|d| d >= start && d <= end)
                .unwrap_or(false)
        }));
        self
    }

    /// Filter by a single provider
    pub fn provider(mut self, provider: &'a ProviderId) -> Self {
        self.filters.push(Box::new(move |p| &p.provider_id == provider));
        self
    }

    /// Filter by any of several providers
    pub fn providers(mut self, providers: &'a [ProviderId]) -> Self {
        self.filters.push(Box::new(move |p| providers.contains(&p.provider_id)));
        self
    }

    /// Filter by location; `"all"` or empty disables the filter
    pub fn location(mut self, selected: &'a str) -> Self {
        if !is_all_selection(selected) {
            self.filters.push(Box::new(move |p| {
                p.location_str() == Some(selected)
            }));
        }
        self
    }

    /// Filter by procedure code; `"all"` or empty disables the filter
    pub fn procedure_code(mut self, selected: &'a str) -> Self {
        if !is_all_selection(selected) {
            self.filters.push(Box::new(move |p| p.code.as_deref() == Some(selected)));
        }
        self
    }

    /// Execute the query and return matching procedures
    pub fn execute(self) -> Vec<&'a ProcedureRecord> {
        self.procedures.iter()
            .filter(|procedure| self.filters.iter().all(|filter| filter(*procedure)))
            .collect()
    }

    /// Execute the query and return count only
    pub fn count(self) -> usize {
        self.execute().len()
    }
}
