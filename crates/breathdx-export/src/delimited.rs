//! 分段文本导出
//!
//! 格式：会话信息段、会话详情段、传感器数据段，段间空行；数据行的时间戳总是加引号。

use breathdx_core::SensorReading;
use std::fmt;

use crate::layout::{reading_row, SessionExport, SUBSESSION_READING_HEADERS};

/// 含分隔符、引号或换行的字段加引号
pub fn escape_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn quoted(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// 单个子会话的分段文本
pub struct SubsessionCsv<'a> {
    pub export: &'a SessionExport<'a>,
    pub subsession_id: &'a str,
    pub readings: &'a [SensorReading],
}

impl fmt::Display for SubsessionCsv<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let export = self.export;

        writeln!(f, "=== SESSION INFORMATION ===")?;
        writeln!(f, "Patient Name,{}", escape_field(export.patient_name()))?;
        writeln!(f, "Patient ID,{}", escape_field(export.patient_id()))?;
        writeln!(f, "Session ID,{}", escape_field(export.session_id))?;
        writeln!(f, "Subsession ID,{}", escape_field(self.subsession_id))?;
        writeln!(f)?;

        writeln!(f, "=== SESSION DETAILS ===")?;
        for (label, value) in export.detail_rows() {
            writeln!(f, "{},{}", label, escape_field(&value))?;
        }
        writeln!(f)?;

        writeln!(f, "=== SENSOR DATA ===")?;
        writeln!(f, "{}", SUBSESSION_READING_HEADERS.join(","))?;
        for reading in self.readings {
            let [temperature, humidity, sensor1, sensor2, timestamp] = reading_row(reading);
            writeln!(
                f,
                "{},{},{},{},{}",
                temperature,
                humidity,
                sensor1,
                sensor2,
                quoted(&timestamp)
            )?;
        }
        Ok(())
    }
}

pub fn subsession_csv(export: &SessionExport<'_>, subsession_id: &str, readings: &[SensorReading]) -> String {
    SubsessionCsv {
        export,
        subsession_id,
        readings,
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use breathdx_core::{Patient, PatientInfo, Value};

    #[test]
    fn test_sections_and_rows() {
        let patient = Patient {
            id: "P-2".into(),
            info: PatientInfo {
                name: "Doe, Jane".into(),
                age: 41,
                sex: "Female".into(),
                mobile: "555".into(),
                married: "Married".into(),
            },
            created_at: None,
        };
        let export = SessionExport::new(&patient, "sessionID_003", None);

        let mut reading = SensorReading::new(36.5, 41.0, 120.0, 300.0);
        reading.timestamp = Some(Value::from("2024-03-01T10:00:00Z"));
        let text = subsession_csv(&export, "subsession_001", &[reading]);

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "=== SESSION INFORMATION ===");
        assert_eq!(lines[1], "Patient Name,\"Doe, Jane\"");
        assert_eq!(lines[4], "Subsession ID,subsession_001");
        assert_eq!(lines[5], "");
        assert_eq!(lines[6], "=== SESSION DETAILS ===");
        assert_eq!(lines[11], "Session Timestamp,N/A");
        assert_eq!(lines[13], "=== SENSOR DATA ===");
        assert_eq!(lines[14], "Temperature,Humidity,SGP40,MQ2,Timestamp");
        assert_eq!(lines[15], "36.5,41,120,300,\"2024-03-01 10:00:00\"");
        assert_eq!(lines.len(), 16);
    }

    #[test]
    fn test_escape_field() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a\"b"), "\"a\"\"b\"");
    }
}
