//! Pairing IoT samples with weather samples.
//!
//! Two policies, each backing one endpoint:
//!
//! - [`compare_latest`]: every IoT sample against the single most recent
//!   weather sample (broadcast, not a time join).
//! - [`combine_positional`]: the i-th IoT sample with the i-th weather sample
//!   (positional, not a time join).
//!
//! Both keep the IoT series in the order it was listed, and both produce
//! exactly one row per IoT sample.

use crate::observation::{CombinedRow, ComparisonRow, Observation};
use crate::timestamp::{millis_to_seconds, normalize_to_millis};

/// The observation with the greatest normalized timestamp.
///
/// Ties keep the earliest element. `None` for an empty slice.
pub fn latest(observations: &[Observation]) -> Option<&Observation> {
    observations.iter().fold(None, |best, current| match best {
        Some(best)
            if normalize_to_millis(current.timestamp) <= normalize_to_millis(best.timestamp) =>
        {
            Some(best)
        }
        _ => Some(current),
    })
}

/// Compare each IoT sample against the latest weather sample.
pub fn compare_latest(iot: &[Observation], weather: &[Observation]) -> Vec<ComparisonRow> {
    let reference = latest(weather).map(|o| o.temperature);
    iot.iter()
        .map(|record| ComparisonRow {
            timestamp: record.timestamp,
            iot_temperature: record.temperature,
            smhi_temperature: reference,
            difference: reference.map(|smhi| record.temperature - smhi),
        })
        .collect()
}

/// Weather samples with their timestamps floored from milliseconds to seconds.
pub fn weather_in_seconds(weather: &[Observation]) -> Vec<Observation> {
    weather
        .iter()
        .map(|record| Observation {
            timestamp: millis_to_seconds(record.timestamp),
            ..record.clone()
        })
        .collect()
}

/// Pair IoT and weather samples by index.
///
/// Rows past the end of the weather series carry no weather temperature;
/// weather samples past the end of the IoT series are dropped.
pub fn combine_positional(iot: &[Observation], weather: &[Observation]) -> Vec<CombinedRow> {
    let weather = weather_in_seconds(weather);
    iot.iter()
        .enumerate()
        .map(|(index, record)| CombinedRow {
            timestamp: record.timestamp,
            iot_temperature: record.temperature,
            smhi_temperature: weather.get(index).map(|w| w.temperature),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(timestamp: i64, temperature: f64) -> Observation {
        Observation {
            device_id: "d".to_string(),
            temperature,
            humidity: None,
            timestamp,
            location: None,
        }
    }

    #[test]
    fn test_latest_empty() {
        assert!(latest(&[]).is_none());
    }

    #[test]
    fn test_latest_single() {
        let only = [sample(7, 1.0)];
        assert_eq!(latest(&only), Some(&only[0]));
    }

    #[test]
    fn test_latest_picks_greatest() {
        let series = [sample(50, 18.0), sample(150, 19.0), sample(100, 30.0)];
        let best = latest(&series).unwrap();
        assert_eq!(best.timestamp, 150);
        assert!(series.iter().all(|o| best.timestamp >= o.timestamp));
    }

    #[test]
    fn test_latest_tie_keeps_first() {
        let series = [sample(10, 1.0), sample(200, 2.0), sample(200, 3.0)];
        assert_eq!(latest(&series).unwrap().temperature, 2.0);
    }

    #[test]
    fn test_latest_normalizes_units() {
        // 1_700_000_001 s is later than 1_700_000_000_500 ms.
        let series = [sample(1_700_000_000_500, 1.0), sample(1_700_000_001, 2.0)];
        assert_eq!(latest(&series).unwrap().temperature, 2.0);

        // Equal instants in different units tie; the first wins.
        let series = [sample(1_700_000_000_000, 1.0), sample(1_700_000_000, 2.0)];
        assert_eq!(latest(&series).unwrap().temperature, 1.0);
    }

    #[test]
    fn test_compare_example() {
        let iot = [sample(100, 20.0), sample(200, 21.0)];
        let weather = [sample(50, 18.0), sample(150, 19.0)];
        let rows = compare_latest(&iot, &weather);
        assert_eq!(
            rows,
            vec![
                ComparisonRow {
                    timestamp: 100,
                    iot_temperature: 20.0,
                    smhi_temperature: Some(19.0),
                    difference: Some(1.0),
                },
                ComparisonRow {
                    timestamp: 200,
                    iot_temperature: 21.0,
                    smhi_temperature: Some(19.0),
                    difference: Some(2.0),
                },
            ]
        );
    }

    #[test]
    fn test_compare_without_weather() {
        let iot = [sample(100, 20.0), sample(200, 21.0), sample(300, 22.0)];
        let rows = compare_latest(&iot, &[]);
        assert_eq!(rows.len(), 3);
        assert!(rows
            .iter()
            .all(|r| r.smhi_temperature.is_none() && r.difference.is_none()));
    }

    #[test]
    fn test_compare_length_follows_iot() {
        let weather: Vec<Observation> = (0..10).map(|i| sample(i, i as f64)).collect();
        assert!(compare_latest(&[], &weather).is_empty());
        assert_eq!(compare_latest(&[sample(1, 1.0)], &weather).len(), 1);
    }

    #[test]
    fn test_compare_keeps_iot_order() {
        let iot = [sample(300, 1.0), sample(100, 2.0), sample(200, 3.0)];
        let rows = compare_latest(&iot, &[sample(1, 0.0)]);
        let timestamps: Vec<i64> = rows.iter().map(|r| r.timestamp).collect();
        assert_eq!(timestamps, vec![300, 100, 200]);
    }

    #[test]
    fn test_combine_example() {
        let iot = [sample(100, 20.0), sample(200, 21.0)];
        let weather = [sample(50_000, 18.0)];
        let rows = combine_positional(&iot, &weather);
        assert_eq!(
            rows,
            vec![
                CombinedRow {
                    timestamp: 100,
                    iot_temperature: 20.0,
                    smhi_temperature: Some(18.0),
                },
                CombinedRow {
                    timestamp: 200,
                    iot_temperature: 21.0,
                    smhi_temperature: None,
                },
            ]
        );
    }

    #[test]
    fn test_combine_shorter_weather_pads_tail() {
        let iot: Vec<Observation> = (0..5).map(|i| sample(i, 20.0)).collect();
        let weather = [sample(1000, 1.0), sample(2000, 2.0)];
        let rows = combine_positional(&iot, &weather);
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0].smhi_temperature, Some(1.0));
        assert_eq!(rows[1].smhi_temperature, Some(2.0));
        assert!(rows[2..].iter().all(|r| r.smhi_temperature.is_none()));
    }

    #[test]
    fn test_combine_empty_weather() {
        let iot = [sample(1, 1.0), sample(2, 2.0)];
        let rows = combine_positional(&iot, &[]);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.smhi_temperature.is_none()));
    }

    #[test]
    fn test_combine_drops_extra_weather() {
        let weather: Vec<Observation> = (0..4).map(|i| sample(i * 1000, i as f64)).collect();
        let rows = combine_positional(&[sample(9, 9.0)], &weather);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].smhi_temperature, Some(0.0));
    }

    #[test]
    fn test_combine_is_positional_not_temporal() {
        // The closest weather sample in time is the second one, but pairing is by index.
        let iot = [sample(2_000, 20.0)];
        let weather = [sample(1_000_000, 5.0), sample(2_000_000, 6.0)];
        let rows = combine_positional(&iot, &weather);
        assert_eq!(rows[0].smhi_temperature, Some(5.0));
    }

    #[test]
    fn test_weather_in_seconds() {
        let converted = weather_in_seconds(&[sample(1_700_000_000_999, 3.0)]);
        assert_eq!(converted[0].timestamp, 1_700_000_000);
        assert_eq!(converted[0].temperature, 3.0);
    }
}
