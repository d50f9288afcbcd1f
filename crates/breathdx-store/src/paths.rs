//! 文档路径
//!
//! 路径由交替的集合名/文档 id 组成，对应实体层级：
//! `patients/{id}/sessions/{id}/subsessions/{id}/sensor_data/{id}`

pub const PATIENTS: &str = "patients";
pub const SESSIONS: &str = "sessions";
pub const SUBSESSIONS: &str = "subsessions";
pub const SENSOR_DATA: &str = "sensor_data";

/// 监测信号文档
pub const ACTIVE_MONITORING: &str = "active_monitoring/current";

/// 结果显示请求文档
pub const RESULT_DISPLAY_REQUEST: &str = "session_result_request/display";

pub fn patient(patient_id: &str) -> String {
    format!("{}/{}", PATIENTS, patient_id)
}

pub fn sessions(patient_id: &str) -> String {
    format!("{}/{}", patient(patient_id), SESSIONS)
}

pub fn session(patient_id: &str, session_id: &str) -> String {
    format!("{}/{}", sessions(patient_id), session_id)
}

pub fn subsessions(patient_id: &str, session_id: &str) -> String {
    format!("{}/{}", session(patient_id, session_id), SUBSESSIONS)
}

pub fn subsession(patient_id: &str, session_id: &str, subsession_id: &str) -> String {
    format!("{}/{}", subsessions(patient_id, session_id), subsession_id)
}

pub fn sensor_data(patient_id: &str, session_id: &str, subsession_id: &str) -> String {
    format!("{}/{}", subsession(patient_id, session_id, subsession_id), SENSOR_DATA)
}

/// 可作为单个路径段的文档 id：非空，不含路径或查询分隔符，也不是相对段
pub fn is_document_id(id: &str) -> bool {
    !id.is_empty() && id != "." && id != ".." && !id.contains(['/', '?', '#'])
}

/// 路径最后一段
pub fn document_id(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hierarchy() {
        assert_eq!(patient("P-1"), "patients/P-1");
        assert_eq!(
            sensor_data("P-1", "sessionID_001", "subsession_002"),
            "patients/P-1/sessions/sessionID_001/subsessions/subsession_002/sensor_data"
        );
        assert_eq!(document_id(&session("P-1", "sessionID_004")), "sessionID_004");
    }

    #[test]
    fn test_document_id_rules() {
        assert!(is_document_id("P-12"));
        assert!(is_document_id("subsession_001"));
        assert!(!is_document_id(""));
        assert!(!is_document_id(".."));
        assert!(!is_document_id("P-1/sessions"));
        assert!(!is_document_id("P-1?key=x"));
        assert!(!is_document_id("P-1#frag"));
    }
}
