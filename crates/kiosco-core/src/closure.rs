//! # Closure Listing
//!
//! Filtering, sorting and summarizing of closed shifts for the history
//! screen and its export.
//!
//! Date presets are evaluated against each closure's end time, using
//! calendar days of the store's UTC offset (a closure at 23:30 in Buenos
//! Aires belongs to that day, not to the next UTC day).

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use ts_rs::TS;

use crate::money::Money;
use crate::types::TurnClosure;

// =============================================================================
// Filter & Sort
// =============================================================================

/// Which closures to show, by end date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case", tag = "preset")]
pub enum DatePreset {
    #[default]
    All,
    Today,
    Yesterday,
    /// From midnight seven days ago until now.
    LastSevenDays,
    ThisMonth,
    /// Inclusive calendar-day range; a missing bound is open.
    Custom {
        #[ts(as = "Option<String>")]
        from: Option<NaiveDate>,
        #[ts(as = "Option<String>")]
        to: Option<NaiveDate>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ClosureFilter {
    /// Case-insensitive match on admin name or closure id.
    pub search: Option<String>,
    /// Exact admin name.
    pub admin_name: Option<String>,
    pub date: DatePreset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ClosureSortBy {
    #[default]
    Date,
    Admin,
    Total,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Defaults to newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ClosureSort {
    pub by: ClosureSortBy,
    pub order: SortOrder,
}

/// Half-open UTC window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Window {
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

impl Window {
    fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| at >= s) && self.end.map_or(true, |e| at < e)
    }
}

/// UTC instant of local midnight starting `date`.
fn local_midnight(date: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    let local = date.and_time(NaiveTime::MIN);
    Utc.from_utc_datetime(&(local - Duration::seconds(offset.local_minus_utc() as i64)))
}

impl DatePreset {
    fn window(&self, now: DateTime<Utc>, offset: FixedOffset) -> Window {
        let today = now.with_timezone(&offset).date_naive();
        let today_start = local_midnight(today, offset);

        match *self {
            DatePreset::All => Window {
                start: None,
                end: None,
            },
            DatePreset::Today => Window {
                start: Some(today_start),
                end: None,
            },
            DatePreset::Yesterday => Window {
                start: Some(local_midnight(today - Duration::days(1), offset)),
                end: Some(today_start),
            },
            DatePreset::LastSevenDays => Window {
                start: Some(local_midnight(today - Duration::days(7), offset)),
                end: None,
            },
            DatePreset::ThisMonth => {
                let first = NaiveDate::from_ymd_opt(today.year(), today.month(), 1).unwrap_or(today);
                Window {
                    start: Some(local_midnight(first, offset)),
                    end: None,
                }
            }
            DatePreset::Custom { from, to } => Window {
                start: from.map(|d| local_midnight(d, offset)),
                end: to.map(|d| local_midnight(d + Duration::days(1), offset)),
            },
        }
    }
}

/// Applies `filter` and `sort` to `closures`.
///
/// `now` anchors the relative presets; `offset` defines calendar days.
pub fn filter_closures(
    closures: &[TurnClosure],
    filter: &ClosureFilter,
    sort: ClosureSort,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Vec<TurnClosure> {
    let term = filter
        .search
        .as_deref()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty());
    let admin = filter.admin_name.as_deref().filter(|a| !a.is_empty());
    let window = filter.date.window(now, offset);

    let mut result: Vec<TurnClosure> = closures
        .iter()
        .filter(|c| {
            term.as_deref().map_or(true, |t| {
                c.admin_name.to_lowercase().contains(t) || c.id.to_lowercase().contains(t)
            })
        })
        .filter(|c| admin.map_or(true, |a| c.admin_name == a))
        .filter(|c| window.contains(c.ended_at))
        .cloned()
        .collect();

    result.sort_by(|a, b| {
        let ordering = match sort.by {
            ClosureSortBy::Date => a.ended_at.cmp(&b.ended_at),
            ClosureSortBy::Admin => compare_names(&a.admin_name, &b.admin_name),
            ClosureSortBy::Total => a.totals.general.cmp(&b.totals.general),
        };
        match sort.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
    result
}

fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Distinct admin names, sorted, for the admin filter dropdown.
pub fn closure_admins(closures: &[TurnClosure]) -> Vec<String> {
    let mut admins: Vec<String> = closures.iter().map(|c| c.admin_name.clone()).collect();
    admins.sort_by(|a, b| compare_names(a, b));
    admins.dedup();
    admins
}

// =============================================================================
// Summary
// =============================================================================

/// Aggregate row shown above the closure list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ClosureSummary {
    pub closures: i64,
    pub sales_count: i64,
    pub cash: Money,
    pub transfer: Money,
    pub account_credit: Money,
    pub general: Money,
}

pub fn summarize_closures(closures: &[TurnClosure]) -> ClosureSummary {
    closures
        .iter()
        .fold(ClosureSummary::default(), |mut summary, c| {
            summary.closures += 1;
            summary.sales_count += c.sales_count;
            summary.cash += c.totals.cash;
            summary.transfer += c.totals.transfer;
            summary.account_credit += c.totals.account_credit;
            summary.general += c.totals.general;
            summary
        })
}

/// Shift length in hours, for display.
pub fn duration_hours(closure: &TurnClosure) -> f64 {
    (closure.ended_at - closure.started_at).num_seconds() as f64 / 3600.0
}

/// General total divided by the number of sales, or zero without sales.
pub fn average_per_sale(closure: &TurnClosure) -> Money {
    if closure.sales_count > 0 {
        closure.totals.general.div_round(closure.sales_count)
    } else {
        Money::zero()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::ShiftTotals;

    fn art() -> FixedOffset {
        FixedOffset::west_opt(3 * 3600).unwrap()
    }

    /// 2025-03-14 15:00 in Buenos Aires.
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 18, 0, 0).unwrap()
    }

    fn closure(id: &str, admin: &str, ended: DateTime<Utc>, general: i64, sales: i64) -> TurnClosure {
        TurnClosure {
            id: id.to_string(),
            shift_id: format!("shift-{id}"),
            admin_name: admin.to_string(),
            started_at: ended - Duration::hours(8),
            ended_at: ended,
            sales: Vec::new(),
            withdrawals: Vec::new(),
            expenses: Vec::new(),
            totals: ShiftTotals {
                cash: Money::from_pesos(general),
                general: Money::from_pesos(general),
                ..ShiftTotals::zero()
            },
            sales_count: sales,
            created_at: ended,
        }
    }

    fn fixture() -> Vec<TurnClosure> {
        vec![
            // 2025-03-14 10:00 local
            closure("aaa-today", "Marta", Utc.with_ymd_and_hms(2025, 3, 14, 13, 0, 0).unwrap(), 500, 5),
            // 2025-03-13 23:30 local (already the 14th in UTC)
            closure("bbb-late", "jorge", Utc.with_ymd_and_hms(2025, 3, 14, 2, 30, 0).unwrap(), 900, 3),
            // 2025-03-10 local
            closure("ccc-week", "Marta", Utc.with_ymd_and_hms(2025, 3, 10, 15, 0, 0).unwrap(), 100, 1),
            // 2025-02-20 local
            closure("ddd-feb", "Ana", Utc.with_ymd_and_hms(2025, 2, 20, 15, 0, 0).unwrap(), 300, 0),
        ]
    }

    fn ids(list: &[TurnClosure]) -> Vec<&str> {
        list.iter().map(|c| c.id.as_str()).collect()
    }

    fn with_date(date: DatePreset) -> ClosureFilter {
        ClosureFilter {
            date,
            ..ClosureFilter::default()
        }
    }

    #[test]
    fn test_default_is_all_newest_first() {
        let list = filter_closures(&fixture(), &ClosureFilter::default(), ClosureSort::default(), now(), art());
        assert_eq!(ids(&list), vec!["aaa-today", "bbb-late", "ccc-week", "ddd-feb"]);
    }

    #[test]
    fn test_today_and_yesterday_use_local_days() {
        let sort = ClosureSort::default();
        let today = filter_closures(&fixture(), &with_date(DatePreset::Today), sort, now(), art());
        assert_eq!(ids(&today), vec!["aaa-today"]);

        let yesterday = filter_closures(&fixture(), &with_date(DatePreset::Yesterday), sort, now(), art());
        assert_eq!(ids(&yesterday), vec!["bbb-late"]);
    }

    #[test]
    fn test_week_month_and_custom() {
        let sort = ClosureSort::default();
        let week = filter_closures(&fixture(), &with_date(DatePreset::LastSevenDays), sort, now(), art());
        assert_eq!(ids(&week), vec!["aaa-today", "bbb-late", "ccc-week"]);

        let month = filter_closures(&fixture(), &with_date(DatePreset::ThisMonth), sort, now(), art());
        assert_eq!(month.len(), 3);

        let custom = DatePreset::Custom {
            from: NaiveDate::from_ymd_opt(2025, 2, 1),
            to: NaiveDate::from_ymd_opt(2025, 3, 10),
        };
        let list = filter_closures(&fixture(), &with_date(custom), sort, now(), art());
        assert_eq!(ids(&list), vec!["ccc-week", "ddd-feb"]);
    }

    #[test]
    fn test_search_and_admin_filter() {
        let sort = ClosureSort::default();
        let filter = ClosureFilter {
            search: Some("MAR".to_string()),
            ..ClosureFilter::default()
        };
        assert_eq!(ids(&filter_closures(&fixture(), &filter, sort, now(), art())), vec!["aaa-today", "ccc-week"]);

        let filter = ClosureFilter {
            search: Some("feb".to_string()),
            ..ClosureFilter::default()
        };
        assert_eq!(ids(&filter_closures(&fixture(), &filter, sort, now(), art())), vec!["ddd-feb"]);

        let filter = ClosureFilter {
            admin_name: Some("jorge".to_string()),
            ..ClosureFilter::default()
        };
        assert_eq!(ids(&filter_closures(&fixture(), &filter, sort, now(), art())), vec!["bbb-late"]);
    }

    #[test]
    fn test_sort_by_admin_and_total() {
        let all = ClosureFilter::default();
        let by_admin = ClosureSort {
            by: ClosureSortBy::Admin,
            order: SortOrder::Asc,
        };
        let list = filter_closures(&fixture(), &all, by_admin, now(), art());
        let admins: Vec<&str> = list.iter().map(|c| c.admin_name.as_str()).collect();
        assert_eq!(admins, vec!["Ana", "jorge", "Marta", "Marta"]);

        let by_total = ClosureSort {
            by: ClosureSortBy::Total,
            order: SortOrder::Desc,
        };
        let list = filter_closures(&fixture(), &all, by_total, now(), art());
        assert_eq!(ids(&list), vec!["bbb-late", "aaa-today", "ddd-feb", "ccc-week"]);
    }

    #[test]
    fn test_summary_and_per_closure_figures() {
        let summary = summarize_closures(&fixture());
        assert_eq!(summary.closures, 4);
        assert_eq!(summary.sales_count, 9);
        assert_eq!(summary.general, Money::from_pesos(1800));
        assert_eq!(summary.cash, Money::from_pesos(1800));

        let c = &fixture()[1];
        assert_eq!(average_per_sale(c), Money::from_pesos(300));
        assert_eq!(average_per_sale(&fixture()[3]), Money::zero());
        assert!((duration_hours(c) - 8.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_closure_admins() {
        assert_eq!(closure_admins(&fixture()), vec!["Ana", "jorge", "Marta"]);
    }
}
