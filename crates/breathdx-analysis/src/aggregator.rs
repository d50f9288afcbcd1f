//! 结果汇总
//!
//! 子会话指标：
//! - SENSOR_1 升序取最低 `min(10, N)` 个读数求均值
//! - SENSOR_2 降序取最高 `min(10, N)` 个读数求均值
//! - 全部读数的温度均值与湿度均值
//!
//! 结果统一保留两位小数。

use breathdx_core::utils::{mean, round2};
use breathdx_core::{Metrics, SensorReading, SubsessionRecord};
use tracing::{debug, warn};

/// 极值均值的取样个数
pub const EXTREME_SAMPLE_SIZE: usize = 10;

/// 没有读数时提示操作员的信息
pub const NO_DATA_MESSAGE: &str =
    "No sensor data collected. Please check microcontroller connection.";

/// 子会话汇总结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aggregate {
    Computed {
        metrics: Metrics,
        reading_count: usize,
    },
    /// 没有任何读数
    NoData,
}

impl Aggregate {
    /// 汇总指标，无数据时全部为零
    pub fn metrics(&self) -> Metrics {
        match self {
            Self::Computed { metrics, .. } => *metrics,
            Self::NoData => Metrics::ZERO,
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::NoData)
    }

    pub fn warning(&self) -> Option<&'static str> {
        self.is_no_data().then_some(NO_DATA_MESSAGE)
    }

    pub fn reading_count(&self) -> usize {
        match self {
            Self::Computed { reading_count, .. } => *reading_count,
            Self::NoData => 0,
        }
    }
}

fn sorted(values: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut values: Vec<f64> = values.collect();
    values.sort_by(f64::total_cmp);
    values
}

/// 最小的 `min(count, N)` 个值的均值
pub fn average_lowest(values: impl IntoIterator<Item = f64>, count: usize) -> Option<f64> {
    let values = sorted(values.into_iter());
    let take = count.min(values.len());
    mean(&values[..take])
}

/// 最大的 `min(count, N)` 个值的均值
pub fn average_highest(values: impl IntoIterator<Item = f64>, count: usize) -> Option<f64> {
    let values = sorted(values.into_iter());
    let take = count.min(values.len());
    mean(&values[values.len() - take..])
}

/// 计算一个子会话的汇总指标
pub fn summarize_readings(readings: &[SensorReading]) -> Aggregate {
    if readings.is_empty() {
        warn!("No sensor readings to summarize");
        return Aggregate::NoData;
    }

    let temperatures: Vec<f64> = readings.iter().map(|r| r.temperature).collect();
    let humidities: Vec<f64> = readings.iter().map(|r| r.humidity).collect();

    let metrics = Metrics {
        avg_temp: mean(&temperatures).unwrap_or_default(),
        avg_humidity: mean(&humidities).unwrap_or_default(),
        avg_lowest_sensor1: average_lowest(readings.iter().map(|r| r.sensor1), EXTREME_SAMPLE_SIZE)
            .unwrap_or_default(),
        avg_highest_sensor2: average_highest(readings.iter().map(|r| r.sensor2), EXTREME_SAMPLE_SIZE)
            .unwrap_or_default(),
    }
    .rounded();

    debug!("Summarized {} readings: {:?}", readings.len(), metrics);
    Aggregate::Computed {
        metrics,
        reading_count: readings.len(),
    }
}

/// 会话汇总：已有结果（带 `avgTemp`）的子会话各项指标的简单平均，不按读数个数加权
///
/// 没有任何子会话带结果时返回 None。
pub fn session_metrics(subsessions: &[SubsessionRecord]) -> Option<Metrics> {
    let completed: Vec<Metrics> = subsessions.iter().filter_map(|s| s.metrics).collect();
    if completed.is_empty() {
        return None;
    }

    let average = |pick: fn(&Metrics) -> f64| {
        let values: Vec<f64> = completed.iter().map(pick).collect();
        mean(&values).unwrap_or_default()
    };

    let metrics = Metrics {
        avg_temp: average(|m| m.avg_temp),
        avg_humidity: average(|m| m.avg_humidity),
        avg_lowest_sensor1: average(|m| m.avg_lowest_sensor1),
        avg_highest_sensor2: average(|m| m.avg_highest_sensor2),
    }
    .rounded();

    debug!(
        "Session metrics over {} of {} subsessions",
        completed.len(),
        subsessions.len()
    );
    Some(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn reading(sensor1: f64, sensor2: f64) -> SensorReading {
        SensorReading::new(36.0, 40.0, sensor1, sensor2)
    }

    fn subsession(id: &str, metrics: Option<Metrics>) -> SubsessionRecord {
        SubsessionRecord {
            id: id.into(),
            status: None,
            timestamp: None,
            metrics,
        }
    }

    #[test]
    fn test_empty_readings_report_no_data() {
        let aggregate = summarize_readings(&[]);
        assert!(aggregate.is_no_data());
        assert_eq!(aggregate.metrics(), Metrics::ZERO);
        assert_eq!(aggregate.warning(), Some(NO_DATA_MESSAGE));
        assert_eq!(aggregate.reading_count(), 0);
    }

    #[test]
    fn test_extremes_use_ten_readings() {
        // 1..=20：最低十个均值 5.5，最高十个均值 15.5
        let readings: Vec<SensorReading> = (1..=20)
            .map(|i| reading(i as f64, i as f64))
            .collect();

        let metrics = summarize_readings(&readings).metrics();
        assert_eq!(metrics.avg_lowest_sensor1, 5.5);
        assert_eq!(metrics.avg_highest_sensor2, 15.5);
        assert_eq!(metrics.avg_temp, 36.0);
        assert_eq!(metrics.avg_humidity, 40.0);
    }

    #[test]
    fn test_fewer_than_ten_readings_use_all() {
        let readings = vec![reading(3.0, 7.0), reading(1.0, 9.0), reading(2.0, 8.0)];
        let aggregate = summarize_readings(&readings);
        assert_eq!(aggregate.reading_count(), 3);
        assert_eq!(aggregate.metrics().avg_lowest_sensor1, 2.0);
        assert_eq!(aggregate.metrics().avg_highest_sensor2, 8.0);
        assert!(aggregate.warning().is_none());
    }

    #[test]
    fn test_results_rounded_to_two_places() {
        let readings = vec![
            SensorReading::new(36.111, 40.0, 1.0, 1.0),
            SensorReading::new(36.222, 41.0, 2.0, 2.0),
            SensorReading::new(36.333, 43.0, 2.0, 2.0),
        ];
        let metrics = summarize_readings(&readings).metrics();
        assert_eq!(metrics.avg_temp, 36.22);
        assert_eq!(metrics.avg_humidity, 41.33);
        assert_eq!(metrics.avg_lowest_sensor1, 1.67);
    }

    #[test]
    fn test_session_metrics_skip_subsessions_without_result() {
        let first = Metrics {
            avg_temp: 36.0,
            avg_humidity: 40.0,
            avg_lowest_sensor1: 100.0,
            avg_highest_sensor2: 300.0,
        };
        let second = Metrics {
            avg_temp: 37.0,
            avg_humidity: 44.0,
            avg_lowest_sensor1: 110.0,
            avg_highest_sensor2: 310.0,
        };
        let subsessions = vec![
            subsession("subsession_001", Some(first)),
            subsession("subsession_002", None),
            subsession("subsession_003", Some(second)),
        ];

        let metrics = session_metrics(&subsessions).unwrap();
        assert_eq!(metrics.avg_temp, 36.5);
        assert_eq!(metrics.avg_humidity, 42.0);
        assert_eq!(metrics.avg_lowest_sensor1, 105.0);
        assert_eq!(metrics.avg_highest_sensor2, 305.0);
    }

    #[test]
    fn test_session_metrics_none_without_results() {
        assert!(session_metrics(&[]).is_none());
        assert!(session_metrics(&[subsession("subsession_001", None)]).is_none());
    }

    proptest! {
        #[test]
        fn prop_lowest_sensor1_is_mean_of_smallest(values in prop::collection::vec(0.0f64..60000.0, 1..40)) {
            let readings: Vec<SensorReading> = values.iter().map(|v| reading(*v, 0.0)).collect();

            let mut expected = values.clone();
            expected.sort_by(|a, b| a.partial_cmp(b).unwrap());
            let take = values.len().min(10);
            let expected = round2(expected[..take].iter().sum::<f64>() / take as f64);

            prop_assert_eq!(summarize_readings(&readings).metrics().avg_lowest_sensor1, expected);
        }

        #[test]
        fn prop_highest_sensor2_is_mean_of_largest(values in prop::collection::vec(0.0f64..4096.0, 1..40)) {
            let readings: Vec<SensorReading> = values.iter().map(|v| reading(0.0, *v)).collect();

            let mut expected = values.clone();
            expected.sort_by(|a, b| b.partial_cmp(a).unwrap());
            let take = values.len().min(10);
            let mut top = expected[..take].to_vec();
            top.sort_by(|a, b| a.partial_cmp(b).unwrap());
            let expected = round2(top.iter().sum::<f64>() / take as f64);

            prop_assert_eq!(summarize_readings(&readings).metrics().avg_highest_sensor2, expected);
        }

        #[test]
        fn prop_summary_invariant_to_order(values in prop::collection::vec((0.0f64..60000.0, 0.0f64..4096.0), 1..40)) {
            let forward: Vec<SensorReading> = values.iter().map(|(a, b)| reading(*a, *b)).collect();
            let mut backward = forward.clone();
            backward.reverse();

            let first = summarize_readings(&forward).metrics();
            let second = summarize_readings(&backward).metrics();
            prop_assert_eq!(first.avg_lowest_sensor1, second.avg_lowest_sensor1);
            prop_assert_eq!(first.avg_highest_sensor2, second.avg_highest_sensor2);
        }
    }
}
