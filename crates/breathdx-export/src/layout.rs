//! 导出内容布局
//!
//! 两种导出格式共用的会话信息行与读数列。

use breathdx_core::utils::display_timestamp;
use breathdx_core::{Patient, SensorReading, SessionRecord};

/// 单个子会话导出的读数表头，沿用传感器型号
pub const SUBSESSION_READING_HEADERS: [&str; 5] = ["Temperature", "Humidity", "SGP40", "MQ2", "Timestamp"];

/// 整个会话工作簿的读数表头
pub const SESSION_READING_HEADERS: [&str; 5] = ["Temperature", "Humidity", "SENSOR_1", "SENSOR_2", "Timestamp"];

const NOT_AVAILABLE: &str = "N/A";

/// 一次导出的会话上下文
#[derive(Debug, Clone, Copy)]
pub struct SessionExport<'a> {
    pub patient: &'a Patient,
    pub session_id: &'a str,
    /// 会话文档，读取失败时为 None
    pub session: Option<&'a SessionRecord>,
}

impl<'a> SessionExport<'a> {
    pub fn new(patient: &'a Patient, session_id: &'a str, session: Option<&'a SessionRecord>) -> Self {
        Self {
            patient,
            session_id,
            session,
        }
    }

    /// 会话文档中的姓名优先
    pub fn patient_name(&self) -> &str {
        self.session
            .and_then(|s| s.patient_name.as_deref())
            .unwrap_or(&self.patient.info.name)
    }

    pub fn patient_id(&self) -> &str {
        self.session
            .and_then(|s| s.patient_id.as_deref())
            .unwrap_or(&self.patient.id)
    }

    fn text(value: Option<&String>) -> String {
        value
            .filter(|v| !v.is_empty())
            .cloned()
            .unwrap_or_else(|| NOT_AVAILABLE.to_string())
    }

    /// 会话详情行：(标签, 值)
    pub fn detail_rows(&self) -> Vec<(&'static str, String)> {
        let session = self.session;
        vec![
            ("Meal Time", Self::text(session.and_then(|s| s.meal_time.as_ref()))),
            (
                "Alcohol Consumption",
                Self::text(session.and_then(|s| s.alcohol_consumption.as_ref())),
            ),
            (
                "Blood Glucose Level (mg/dL)",
                session
                    .and_then(|s| s.blood_glucose)
                    .map(format_number)
                    .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            ),
            (
                "Session Duration (Time of Day)",
                Self::text(session.and_then(|s| s.session_duration.as_ref())),
            ),
            (
                "Session Timestamp",
                display_timestamp(session.and_then(|s| s.created_at.as_ref())),
            ),
        ]
    }
}

/// 数值输出，整数不带小数点
pub fn format_number(value: f64) -> String {
    format!("{}", value)
}

/// 一条读数的五列文本
pub fn reading_row(reading: &SensorReading) -> [String; 5] {
    [
        format_number(reading.temperature),
        format_number(reading.humidity),
        format_number(reading.sensor1),
        format_number(reading.sensor2),
        display_timestamp(reading.timestamp.as_ref()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use breathdx_core::{Document, Fields, PatientInfo, Value};

    fn patient() -> Patient {
        Patient {
            id: "P-1".into(),
            info: PatientInfo {
                name: "Fallback".into(),
                age: 30,
                sex: "Male".into(),
                mobile: "123".into(),
                married: "Single".into(),
            },
            created_at: None,
        }
    }

    #[test]
    fn test_missing_session_document_uses_placeholders() {
        let patient = patient();
        let export = SessionExport::new(&patient, "sessionID_001", None);

        assert_eq!(export.patient_name(), "Fallback");
        assert!(export.detail_rows().iter().all(|(_, value)| value == "N/A"));
    }

    #[test]
    fn test_session_document_values() {
        let mut fields = Fields::new();
        fields.insert("patientName".into(), Value::from("Stored"));
        fields.insert("bloodGlucose".into(), Value::Double(110.0));
        fields.insert("createdAt".into(), Value::Integer(1_709_287_200_000));
        let session = SessionRecord::from_document(&Document::new("sessionID_001", fields));

        let patient = patient();
        let export = SessionExport::new(&patient, "sessionID_001", Some(&session));
        let rows = export.detail_rows();

        assert_eq!(export.patient_name(), "Stored");
        assert_eq!(rows[2].1, "110");
        assert_eq!(rows[4].1, "2024-03-01 10:00:00");
    }

    #[test]
    fn test_reading_row() {
        let mut reading = SensorReading::new(36.5, 40.0, 120.0, 305.0);
        assert_eq!(reading_row(&reading)[4], "N/A");

        reading.timestamp = Some(Value::from("2024-03-01T10:00:00Z"));
        assert_eq!(
            reading_row(&reading),
            ["36.5", "40", "120", "305", "2024-03-01 10:00:00"].map(String::from)
        );
    }
}
