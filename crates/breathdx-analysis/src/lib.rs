//! # BreathDx结果分析模块
//!
//! 对采集到的传感器读数进行纯计算：
//! - 子会话汇总：温湿度均值与两路传感器的极值均值
//! - 会话汇总：已完成子会话汇总值的简单平均
//! - 会话对比：两次会话各项指标的差值

pub mod aggregator;
pub mod comparison;

pub use aggregator::{
    average_highest, average_lowest, session_metrics, summarize_readings, Aggregate,
    EXTREME_SAMPLE_SIZE, NO_DATA_MESSAGE,
};
pub use comparison::{ComparisonMode, MetricDeltas, SessionComparison};
