//! Cauldron level-history analysis.
//!
//! Turns raw timestamped level readings into the two signals the
//! expected-volume model needs: a per-cauldron fill rate (median of
//! plausible positive level deltas) and the primary drain event of a
//! given day (peak to valley). Find the actual daily drain — never
//! search for one that happens to fit a courier's report.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use tracing::debug;

use crate::config::ModelConfig;
use crate::types::{DrainSummary, LevelReading};

/// Minimum number of same-day readings needed to call a drain at all.
const MIN_DAY_READINGS: usize = 10;

/// Minimum series length to estimate a fill rate from data.
const MIN_SERIES_READINGS: usize = 10;

/// One peak-to-valley drain event observed in the level data.
#[derive(Debug, Clone, PartialEq)]
pub struct DrainEvent {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub start_level: f64,
    pub end_level: f64,
    pub drain_amount: f64,
    pub duration_minutes: f64,
}

impl DrainEvent {
    /// Audit-friendly form embedded in classified tickets.
    pub fn summary(&self) -> DrainSummary {
        DrainSummary {
            start_time: self.start_time.to_rfc3339(),
            end_time: self.end_time.to_rfc3339(),
            duration_minutes: self.duration_minutes,
            visible_drain: self.drain_amount,
        }
    }
}

/// Indexed, time-sorted level series per cauldron.
pub struct LevelHistory {
    series: HashMap<String, Vec<(DateTime<Utc>, f64)>>,
    cfg: ModelConfig,
}

impl LevelHistory {
    /// Build per-cauldron series from raw readings.
    pub fn new(readings: &[LevelReading], cfg: ModelConfig) -> Self {
        let mut series: HashMap<String, Vec<(DateTime<Utc>, f64)>> = HashMap::new();
        for reading in readings {
            for (cauldron_id, level) in &reading.cauldron_levels {
                series
                    .entry(cauldron_id.clone())
                    .or_default()
                    .push((reading.timestamp, *level));
            }
        }
        for points in series.values_mut() {
            points.sort_by_key(|(ts, _)| *ts);
        }
        Self { series, cfg }
    }

    /// Cauldron ids present in the history, sorted for determinism.
    pub fn cauldron_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.series.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Like [`measured_fill_rate`](Self::measured_fill_rate), falling back
    /// to the configured default when the data cannot support an estimate.
    pub fn fill_rate(&self, cauldron_id: &str) -> f64 {
        self.measured_fill_rate(cauldron_id)
            .unwrap_or(self.cfg.default_fill_rate)
    }

    /// Median fill rate (units/minute) from positive level deltas within
    /// the plausible band, or `None` for short or rate-free series.
    pub fn measured_fill_rate(&self, cauldron_id: &str) -> Option<f64> {
        let points = self.series.get(cauldron_id)?;
        if points.len() < MIN_SERIES_READINGS {
            return None;
        }

        let mut rates = Vec::new();
        for pair in points.windows(2) {
            let (prev_ts, prev_level) = pair[0];
            let (ts, level) = pair[1];
            let minutes = (ts - prev_ts).num_seconds() as f64 / 60.0;
            let delta = level - prev_level;
            if delta > 0.0 && minutes > 0.0 {
                let rate = delta / minutes;
                if rate > self.cfg.fill_rate_floor && rate < self.cfg.fill_rate_ceiling {
                    rates.push(rate);
                }
            }
        }

        if rates.is_empty() {
            debug!(cauldron_id, "No plausible fill deltas in history");
            return None;
        }
        Some(median(&mut rates))
    }

    /// The primary drain event (peak to valley) for one cauldron on one
    /// calendar date, or `None` if the day shows no significant drain.
    pub fn daily_drain(&self, cauldron_id: &str, date: NaiveDate) -> Option<DrainEvent> {
        let points = self.series.get(cauldron_id)?;
        let day: Vec<&(DateTime<Utc>, f64)> = points
            .iter()
            .filter(|(ts, _)| ts.date_naive() == date)
            .collect();
        if day.len() < MIN_DAY_READINGS {
            return None;
        }

        let (peak_idx, &&(peak_time, peak_level)) = day
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))?;
        let (valley_idx, &&(valley_time, valley_level)) = day
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))?;

        // Valley before peak means the day was net filling — no drain.
        if valley_idx <= peak_idx {
            return None;
        }

        let drain_amount = peak_level - valley_level;
        if drain_amount < self.cfg.min_drain_amount {
            return None;
        }

        let duration_minutes = (valley_time - peak_time).num_seconds() as f64 / 60.0;
        Some(DrainEvent {
            start_time: peak_time,
            end_time: valley_time,
            start_level: peak_level,
            end_level: valley_level,
            drain_amount,
            duration_minutes,
        })
    }
}

fn median(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, day, hour, minute, 0).unwrap()
    }

    /// A day that fills at 0.5 units/min, drains 60 units over two hours,
    /// then fills again.
    fn sample_readings(cauldron_id: &str) -> Vec<LevelReading> {
        let mut readings = Vec::new();
        let mut level = 20.0;
        // Fill 06:00–10:00 at 0.5/min sampled every 30 min.
        for i in 0..9 {
            readings.push(reading(cauldron_id, ts(1, 6, 0) + chrono::Duration::minutes(30 * i), level));
            level += 15.0;
        }
        // Drain 10:00–12:00 down to 35.
        let peak = level;
        for i in 1..=4 {
            let drained = peak - (peak - 35.0) * (i as f64 / 4.0);
            readings.push(reading(cauldron_id, ts(1, 10, 0) + chrono::Duration::minutes(30 * i), drained));
        }
        // Refill a little afterwards.
        readings.push(reading(cauldron_id, ts(1, 13, 0), 50.0));
        readings
    }

    fn reading(cauldron_id: &str, timestamp: DateTime<Utc>, level: f64) -> LevelReading {
        let mut levels = HashMap::new();
        levels.insert(cauldron_id.to_string(), level);
        LevelReading {
            timestamp,
            cauldron_levels: levels,
        }
    }

    #[test]
    fn test_fill_rate_from_steady_fill() {
        let history = LevelHistory::new(&sample_readings("cauldron_1"), ModelConfig::default());
        let rate = history.fill_rate("cauldron_1");
        // 15 units per 30 minutes.
        assert!((rate - 0.5).abs() < 1e-9, "rate was {rate}");
    }

    #[test]
    fn test_measured_fill_rate_none_without_data() {
        let history = LevelHistory::new(&[], ModelConfig::default());
        assert!(history.measured_fill_rate("cauldron_1").is_none());
    }

    #[test]
    fn test_fill_rate_unknown_cauldron_defaults() {
        let history = LevelHistory::new(&[], ModelConfig::default());
        assert!((history.fill_rate("cauldron_x") - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_fill_rate_short_series_defaults() {
        let readings = vec![reading("cauldron_1", ts(1, 6, 0), 10.0)];
        let history = LevelHistory::new(&readings, ModelConfig::default());
        assert!((history.fill_rate("cauldron_1") - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_daily_drain_peak_to_valley() {
        let history = LevelHistory::new(&sample_readings("cauldron_1"), ModelConfig::default());
        let date = NaiveDate::from_ymd_opt(2025, 11, 1).unwrap();
        let drain = history.daily_drain("cauldron_1", date).unwrap();
        // Peak 140 at 10:00, valley 35 at 12:00.
        assert!((drain.drain_amount - 105.0).abs() < 1e-9, "{drain:?}");
        assert!((drain.duration_minutes - 120.0).abs() < 1e-9);
        assert!(drain.end_time > drain.start_time);
    }

    #[test]
    fn test_daily_drain_wrong_date_is_none() {
        let history = LevelHistory::new(&sample_readings("cauldron_1"), ModelConfig::default());
        let date = NaiveDate::from_ymd_opt(2025, 11, 2).unwrap();
        assert!(history.daily_drain("cauldron_1", date).is_none());
    }

    #[test]
    fn test_daily_drain_too_few_readings_is_none() {
        let readings: Vec<_> = sample_readings("cauldron_1").into_iter().take(5).collect();
        let history = LevelHistory::new(&readings, ModelConfig::default());
        let date = NaiveDate::from_ymd_opt(2025, 11, 1).unwrap();
        assert!(history.daily_drain("cauldron_1", date).is_none());
    }

    #[test]
    fn test_insignificant_drain_is_none() {
        // Flat day with a 5-unit dip — below the 15-unit significance bar.
        let mut readings = Vec::new();
        for i in 0..12 {
            let level = if i == 8 { 45.0 } else { 50.0 };
            readings.push(reading("cauldron_1", ts(1, 6, 0) + chrono::Duration::minutes(30 * i), level));
        }
        let history = LevelHistory::new(&readings, ModelConfig::default());
        let date = NaiveDate::from_ymd_opt(2025, 11, 1).unwrap();
        assert!(history.daily_drain("cauldron_1", date).is_none());
    }

    #[test]
    fn test_net_filling_day_is_none() {
        // Monotonically rising levels: valley is the first reading.
        let mut readings = Vec::new();
        for i in 0..12 {
            readings.push(reading(
                "cauldron_1",
                ts(1, 6, 0) + chrono::Duration::minutes(30 * i),
                10.0 + 5.0 * i as f64,
            ));
        }
        let history = LevelHistory::new(&readings, ModelConfig::default());
        let date = NaiveDate::from_ymd_opt(2025, 11, 1).unwrap();
        assert!(history.daily_drain("cauldron_1", date).is_none());
    }

    #[test]
    fn test_median_odd_and_even() {
        assert!((median(&mut [3.0, 1.0, 2.0]) - 2.0).abs() < 1e-12);
        assert!((median(&mut [4.0, 1.0, 2.0, 3.0]) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_cauldron_ids_sorted() {
        let mut readings = sample_readings("cauldron_2");
        readings.extend(sample_readings("cauldron_1"));
        let history = LevelHistory::new(&readings, ModelConfig::default());
        assert_eq!(history.cauldron_ids(), vec!["cauldron_1", "cauldron_2"]);
    }
}
