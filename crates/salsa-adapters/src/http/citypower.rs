use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use tracing::warn;

use salsa_core::outage::{sort_by_start, OutageWindow};
use salsa_ports::error::SourceError;

const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(Debug, Deserialize)]
struct ListResponse {
    d: ListResults,
}

#[derive(Debug, Deserialize)]
struct ListResults {
    results: Vec<ScheduleItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ScheduleItem {
    #[serde(default)]
    sub_block: Option<String>,
    event_date: String,
    end_date: String,
}

/// Midnight of `now`'s local calendar day in `tz`, as UTC.
pub fn local_day_start(now: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    now.with_timezone(&tz)
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| midnight.and_local_timezone(tz).earliest())
        .map(|start| start.with_timezone(&Utc))
        .unwrap_or(now)
}

/// Parses a municipal schedule listing into windows starting within
/// `[from, from + days]`, ordered by start. Entries with unparseable or
/// inverted times are skipped.
pub fn parse_schedule(
    body: &str,
    from: DateTime<Utc>,
    days: u32,
) -> Result<Vec<OutageWindow>, SourceError> {
    let response: ListResponse =
        serde_json::from_str(body).map_err(|e| SourceError::Malformed(e.to_string()))?;
    let until = from + TimeDelta::days(i64::from(days));

    let mut windows: Vec<OutageWindow> = response
        .d
        .results
        .into_iter()
        .filter_map(|item| match window_of(&item) {
            Ok(window) => Some(window),
            Err(reason) => {
                warn!(
                    sub_block = item.sub_block.as_deref().unwrap_or(""),
                    event_date = %item.event_date,
                    end_date = %item.end_date,
                    reason = %reason,
                    "skipping schedule entry"
                );
                None
            }
        })
        .filter(|w| w.start() >= from && w.start() <= until)
        .collect();

    sort_by_start(&mut windows);
    Ok(windows)
}

fn window_of(item: &ScheduleItem) -> Result<OutageWindow, String> {
    let start = parse_utc(&item.event_date)?;
    let end = parse_utc(&item.end_date)?;
    OutageWindow::new(start, end).map_err(|e| e.to_string())
}

fn parse_utc(s: &str) -> Result<DateTime<Utc>, String> {
    NaiveDateTime::parse_from_str(s, DATE_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| format!("{s:?}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        chrono::DateTime::parse_from_rfc3339(s)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn listing(items: &[(&str, &str)]) -> String {
        let results: Vec<serde_json::Value> = items
            .iter()
            .map(|(start, end)| {
                serde_json::json!({
                    "Title": "Stage2",
                    "SubBlock": "3F",
                    "EventDate": start,
                    "EndDate": end,
                })
            })
            .collect();
        serde_json::json!({ "d": { "results": results } }).to_string()
    }

    #[test]
    fn day_start_follows_local_calendar() {
        let jhb = chrono_tz::Africa::Johannesburg;
        // 23:30 UTC is already the next day in UTC+2.
        assert_eq!(
            local_day_start(ts("2024-01-01T23:30:00Z"), jhb),
            ts("2024-01-01T22:00:00Z")
        );
        assert_eq!(
            local_day_start(ts("2024-01-01T12:00:00Z"), jhb),
            ts("2023-12-31T22:00:00Z")
        );
    }

    #[test]
    fn windows_are_filtered_and_sorted() {
        let body = listing(&[
            ("2024-01-02T16:00:00Z", "2024-01-02T18:30:00Z"),
            ("2024-01-01T16:00:00Z", "2024-01-01T18:30:00Z"),
            ("2023-12-31T16:00:00Z", "2023-12-31T18:30:00Z"),
            ("2024-01-05T16:00:00Z", "2024-01-05T18:30:00Z"),
        ]);

        let windows = parse_schedule(&body, ts("2023-12-31T22:00:00Z"), 2).unwrap();

        let starts: Vec<_> = windows.iter().map(|w| w.start()).collect();
        assert_eq!(
            starts,
            vec![ts("2024-01-01T16:00:00Z"), ts("2024-01-02T16:00:00Z")]
        );
    }

    #[test]
    fn invalid_entries_are_skipped() {
        let body = listing(&[
            ("2024-01-01T16:00:00Z", "2024-01-01T14:00:00Z"),
            ("yesterday", "2024-01-01T18:30:00Z"),
            ("2024-01-01T20:00:00Z", "2024-01-01T22:30:00Z"),
        ]);

        let windows = parse_schedule(&body, ts("2023-12-31T22:00:00Z"), 2).unwrap();

        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].end(), ts("2024-01-01T22:30:00Z"));
    }

    #[test]
    fn empty_listing_is_ok() {
        let windows =
            parse_schedule(r#"{"d":{"results":[]}}"#, ts("2024-01-01T00:00:00Z"), 2).unwrap();
        assert!(windows.is_empty());
    }

    #[test]
    fn unexpected_shape_is_malformed() {
        assert!(matches!(
            parse_schedule(r#"{"value":[]}"#, ts("2024-01-01T00:00:00Z"), 2),
            Err(SourceError::Malformed(_))
        ));
    }
}
