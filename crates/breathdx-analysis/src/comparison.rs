//! 会话对比

use breathdx_core::utils::round2;
use breathdx_core::{Metrics, SessionRecord};
use serde::{Deserialize, Serialize};

/// 对比方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonMode {
    /// 同一患者的两次会话
    SamePatient,
    /// 两位患者各一次会话
    DifferentPatients,
}

/// 各项指标差值（第二次减第一次）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricDeltas {
    pub avg_temp: f64,
    pub avg_humidity: f64,
    pub avg_lowest_sensor1: f64,
    pub avg_highest_sensor2: f64,
    pub subsession_count: i64,
}

impl MetricDeltas {
    pub fn between(first: &Metrics, second: &Metrics, first_count: i64, second_count: i64) -> Self {
        Self {
            avg_temp: round2(second.avg_temp - first.avg_temp),
            avg_humidity: round2(second.avg_humidity - first.avg_humidity),
            avg_lowest_sensor1: round2(second.avg_lowest_sensor1 - first.avg_lowest_sensor1),
            avg_highest_sensor2: round2(second.avg_highest_sensor2 - first.avg_highest_sensor2),
            subsession_count: second_count - first_count,
        }
    }
}

/// 两次会话的对比结果
#[derive(Debug, Clone, PartialEq)]
pub struct SessionComparison {
    pub mode: ComparisonMode,
    pub first: SessionRecord,
    pub second: SessionRecord,
    pub deltas: MetricDeltas,
}

impl SessionComparison {
    /// 两次会话都必须带汇总结果，否则返回 None
    pub fn between(mode: ComparisonMode, first: SessionRecord, second: SessionRecord) -> Option<Self> {
        let deltas = MetricDeltas::between(
            first.metrics.as_ref()?,
            second.metrics.as_ref()?,
            first.subsession_count.unwrap_or_default(),
            second.subsession_count.unwrap_or_default(),
        );

        Some(Self {
            mode,
            first,
            second,
            deltas,
        })
    }
}
