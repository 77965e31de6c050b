use chrono::{DateTime, Datelike, Timelike, Utc};
use fleet_types::HistoricalMetric;

const PRESCALE_WINDOW_MINUTES: u32 = 15;

/// True only in the last `PRESCALE_WINDOW_MINUTES` minutes of the hour, the
/// window the predictive check is meant to fire in. Outside it, `predict`
/// may still return a forecast but the engine must not act on it.
pub fn in_prescale_window(now: DateTime<Utc>) -> bool {
    now.minute() >= 60 - PRESCALE_WINDOW_MINUTES
}

/// Forecasts next-hour CPU as the mean of historical samples captured in the
/// same hour-of-day and day-of-week. A forecast signal, not an oracle, and
/// can be replaced as long as this `predict(now) -> cpu_pct` interface is
/// preserved.
pub fn predict(now: DateTime<Utc>, history: &[HistoricalMetric]) -> Option<f64> {
    let next_hour = (now.hour() + 1) % 24;
    let day = now.weekday().num_days_from_monday() as u8;
    let matching: Vec<f64> = history
        .iter()
        .filter(|m| m.hour_of_day == next_hour as u8 && m.day_of_week == day)
        .map(|m| m.cpu_pct)
        .collect();
    if matching.is_empty() {
        return None;
    }
    Some(matching.iter().sum::<f64>() / matching.len() as f64)
}

/// True if the forecast exceeds the up threshold while the current reading
/// is meaningfully lower, i.e. pre-scaling would actually help.
pub fn should_prescale(predicted_cpu: f64, current_cpu: f64, cpu_up_pct: f64) -> bool {
    predicted_cpu > cpu_up_pct && current_cpu < cpu_up_pct - 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(hour: u8, day: u8, cpu: f64) -> HistoricalMetric {
        HistoricalMetric {
            timestamp: Utc.with_ymd_and_hms(2026, 1, 1, hour as u32, 0, 0).unwrap(),
            cluster_id: "c1".into(),
            hour_of_day: hour,
            day_of_week: day,
            cpu_pct: cpu,
            pending_pods: 0,
            ttl: 0,
        }
    }

    #[test]
    fn predicts_mean_of_matching_hour_and_day() {
        // 2026-01-01 is a Thursday (day_of_week = 3, Monday = 0).
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 13, 0, 0).unwrap();
        let history = vec![sample(14, 3, 80.0), sample(14, 3, 90.0), sample(14, 2, 10.0)];
        assert_eq!(predict(now, &history), Some(85.0));
    }

    #[test]
    fn no_matching_samples_returns_none() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 13, 0, 0).unwrap();
        assert_eq!(predict(now, &[]), None);
    }

    #[test]
    fn prescale_requires_meaningful_gap() {
        assert!(should_prescale(85.0, 50.0, 70.0));
        assert!(!should_prescale(85.0, 68.0, 70.0));
        assert!(!should_prescale(60.0, 50.0, 70.0));
    }

    #[test]
    fn prescale_window_only_opens_near_the_hour_boundary() {
        assert!(!in_prescale_window(Utc.with_ymd_and_hms(2026, 1, 1, 13, 0, 0).unwrap()));
        assert!(!in_prescale_window(Utc.with_ymd_and_hms(2026, 1, 1, 13, 44, 0).unwrap()));
        assert!(in_prescale_window(Utc.with_ymd_and_hms(2026, 1, 1, 13, 45, 0).unwrap()));
        assert!(in_prescale_window(Utc.with_ymd_and_hms(2026, 1, 1, 13, 59, 0).unwrap()));
    }
}
