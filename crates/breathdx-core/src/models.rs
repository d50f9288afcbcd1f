//! 核心数据模型定义
//!
//! 所有实体都是远端文档，客户端不持有权威状态。字段名与设备固件读写的文档保持一致。

use crate::utils::round2;
use crate::value::{Document, Fields, Value};
use serde::{Deserialize, Serialize};

/// 文档字段名
pub mod field {
    pub const BASIC_INFO: &str = "basic_info";
    pub const NAME: &str = "name";
    pub const AGE: &str = "age";
    pub const SEX: &str = "sex";
    pub const MOBILE: &str = "mobile";
    pub const MARRIED: &str = "married";
    pub const CREATED_AT_SNAKE: &str = "created_at";

    pub const SESSION_ID: &str = "session_ID";
    pub const PATIENT_NAME: &str = "patientName";
    pub const PATIENT_ID: &str = "patientId";
    pub const MEAL_TIME: &str = "mealTime";
    pub const ALCOHOL_CONSUMPTION: &str = "alcoholConsumption";
    pub const BLOOD_GLUCOSE: &str = "bloodGlucose";
    pub const SESSION_DURATION: &str = "sessionDuration";
    pub const CREATED_AT: &str = "createdAt";
    pub const SUBSESSION_COUNT: &str = "subsessionCount";
    pub const RESULTS_TIMESTAMP: &str = "resultsTimestamp";

    pub const SUBSESSION_ID: &str = "subsession_ID";
    pub const STATUS: &str = "status";
    pub const TIMESTAMP: &str = "timestamp";

    pub const AVG_TEMP: &str = "avgTemp";
    pub const AVG_HUMIDITY: &str = "avgHumidity";
    pub const AVG_LOWEST_SENSOR_1: &str = "avgLowestSGP40";
    pub const AVG_HIGHEST_SENSOR_2: &str = "avgHighestMQ2";

    pub const TEMPERATURE: &str = "temperature";
    pub const HUMIDITY: &str = "humidity";
    pub const SENSOR_1: &str = "sgp40_raw";
    pub const SENSOR_2: &str = "mq2_adc";

    pub const MONITORING_PATIENT_ID: &str = "patient_id";
    pub const MONITORING_SESSION_ID: &str = "session_id";
    pub const MONITORING_SUBSESSION_ID: &str = "subsession_id";
    pub const MONITORING: &str = "monitoring";
    pub const DISPLAY: &str = "display";
}

/// 患者基本信息，去重时五个字段必须完全一致
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientInfo {
    pub name: String,
    pub age: i64,
    pub sex: String,
    pub mobile: String,
    /// 婚姻状况 (Single / Married / Divorced / Widowed)
    pub married: String,
}

impl PatientInfo {
    /// 读取 `basic_info` 映射，缺失字段按空值处理
    pub fn from_fields(map: &Fields) -> Self {
        let text = |key: &str| {
            map.get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        Self {
            name: text(field::NAME),
            age: map.get(field::AGE).and_then(Value::as_i64).unwrap_or_default(),
            sex: text(field::SEX),
            mobile: text(field::MOBILE),
            married: text(field::MARRIED),
        }
    }

    pub fn to_fields(&self, created_at: &str) -> Fields {
        let mut map = Fields::new();
        map.insert(field::NAME.into(), Value::from(self.name.as_str()));
        map.insert(field::AGE.into(), Value::Integer(self.age));
        map.insert(field::SEX.into(), Value::from(self.sex.as_str()));
        map.insert(field::MOBILE.into(), Value::from(self.mobile.as_str()));
        map.insert(field::MARRIED.into(), Value::from(self.married.as_str()));
        map.insert(field::CREATED_AT_SNAKE.into(), Value::from(created_at));
        map
    }
}

/// 患者
#[derive(Debug, Clone, PartialEq)]
pub struct Patient {
    pub id: String,
    pub info: PatientInfo,
    pub created_at: Option<String>,
}

impl Patient {
    /// 只有带 `basic_info` 的文档才算有效患者
    pub fn from_document(doc: &Document) -> Option<Self> {
        let basic_info = doc.map_field(field::BASIC_INFO)?;
        Some(Self {
            id: doc.id.clone(),
            info: PatientInfo::from_fields(basic_info),
            created_at: basic_info
                .get(field::CREATED_AT_SNAKE)
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }
}

/// 会话登记信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionIntake {
    /// 距上次进餐时间
    pub meal_time: String,
    pub alcohol_consumption: String,
    /// 血糖 (mg/dL)
    pub blood_glucose: f64,
    /// 时段 (Morning / Afternoon / Evening / Night)
    pub session_duration: String,
}

/// 四项汇总指标
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Metrics {
    pub avg_temp: f64,
    pub avg_humidity: f64,
    /// 传感器1 最低若干读数的均值
    pub avg_lowest_sensor1: f64,
    /// 传感器2 最高若干读数的均值
    pub avg_highest_sensor2: f64,
}

impl Metrics {
    pub const ZERO: Metrics = Metrics {
        avg_temp: 0.0,
        avg_humidity: 0.0,
        avg_lowest_sensor1: 0.0,
        avg_highest_sensor2: 0.0,
    };

    /// `avgTemp` 存在即视为已有结果
    pub fn from_fields(fields: &Fields) -> Option<Self> {
        let avg_temp = fields.get(field::AVG_TEMP)?.as_f64()?;
        let number = |key: &str| fields.get(key).and_then(Value::as_f64).unwrap_or_default();

        Some(Self {
            avg_temp,
            avg_humidity: number(field::AVG_HUMIDITY),
            avg_lowest_sensor1: number(field::AVG_LOWEST_SENSOR_1),
            avg_highest_sensor2: number(field::AVG_HIGHEST_SENSOR_2),
        })
    }

    pub fn rounded(&self) -> Self {
        Self {
            avg_temp: round2(self.avg_temp),
            avg_humidity: round2(self.avg_humidity),
            avg_lowest_sensor1: round2(self.avg_lowest_sensor1),
            avg_highest_sensor2: round2(self.avg_highest_sensor2),
        }
    }

    /// 写入四项指标（两位小数，数值类型）
    pub fn write_into(&self, fields: &mut Fields) {
        let rounded = self.rounded();
        fields.insert(field::AVG_LOWEST_SENSOR_1.into(), Value::Double(rounded.avg_lowest_sensor1));
        fields.insert(field::AVG_HIGHEST_SENSOR_2.into(), Value::Double(rounded.avg_highest_sensor2));
        fields.insert(field::AVG_TEMP.into(), Value::Double(rounded.avg_temp));
        fields.insert(field::AVG_HUMIDITY.into(), Value::Double(rounded.avg_humidity));
    }
}

/// 会话
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub id: String,
    pub patient_id: Option<String>,
    pub patient_name: Option<String>,
    pub meal_time: Option<String>,
    pub alcohol_consumption: Option<String>,
    pub blood_glucose: Option<f64>,
    pub session_duration: Option<String>,
    /// 创建时间，可能是 ISO 字符串、毫秒时间戳或 `{seconds}` 映射
    pub created_at: Option<Value>,
    pub metrics: Option<Metrics>,
    pub subsession_count: Option<i64>,
    pub status: Option<String>,
}

impl SessionRecord {
    pub fn from_document(doc: &Document) -> Self {
        let text = |key: &str| doc.str_field(key).map(str::to_string);

        Self {
            id: doc.id.clone(),
            patient_id: text(field::PATIENT_ID),
            patient_name: text(field::PATIENT_NAME),
            meal_time: text(field::MEAL_TIME),
            alcohol_consumption: text(field::ALCOHOL_CONSUMPTION),
            blood_glucose: doc.f64_field(field::BLOOD_GLUCOSE),
            session_duration: text(field::SESSION_DURATION),
            created_at: doc
                .get(field::CREATED_AT)
                .or_else(|| doc.get(field::TIMESTAMP))
                .cloned(),
            metrics: Metrics::from_fields(&doc.fields),
            subsession_count: doc.i64_field(field::SUBSESSION_COUNT),
            status: text(field::STATUS),
        }
    }

    pub fn has_result(&self) -> bool {
        self.metrics.is_some()
    }
}

/// 子会话生命周期
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubsessionStatus {
    InProgress,
    Completed,
}

impl SubsessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// 子会话
#[derive(Debug, Clone, PartialEq)]
pub struct SubsessionRecord {
    pub id: String,
    pub status: Option<SubsessionStatus>,
    pub timestamp: Option<Value>,
    pub metrics: Option<Metrics>,
}

impl SubsessionRecord {
    pub fn from_document(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            status: doc.str_field(field::STATUS).and_then(SubsessionStatus::parse),
            timestamp: doc.get(field::TIMESTAMP).cloned(),
            metrics: Metrics::from_fields(&doc.fields),
        }
    }

    /// 子会话文档的完整字段集
    pub fn fields(id: &str, status: SubsessionStatus, timestamp: &str, metrics: Option<&Metrics>) -> Fields {
        let mut fields = Fields::new();
        fields.insert(field::SUBSESSION_ID.into(), Value::from(id));
        fields.insert(field::TIMESTAMP.into(), Value::from(timestamp));
        fields.insert(field::STATUS.into(), Value::from(status.as_str()));
        if let Some(metrics) = metrics {
            metrics.write_into(&mut fields);
        }
        fields
    }
}

/// 传感器读数，由设备追加写入，客户端只读
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    pub temperature: f64,
    pub humidity: f64,
    /// SENSOR_1 原始值
    pub sensor1: f64,
    /// SENSOR_2 原始值
    pub sensor2: f64,
    pub timestamp: Option<Value>,
}

impl SensorReading {
    pub fn new(temperature: f64, humidity: f64, sensor1: f64, sensor2: f64) -> Self {
        Self {
            temperature,
            humidity,
            sensor1,
            sensor2,
            timestamp: None,
        }
    }

    /// 缺失的数值字段按 0 处理
    pub fn from_document(doc: &Document) -> Self {
        let number = |key: &str| doc.f64_field(key).unwrap_or_default();

        Self {
            temperature: number(field::TEMPERATURE),
            humidity: number(field::HUMIDITY),
            sensor1: number(field::SENSOR_1),
            sensor2: number(field::SENSOR_2),
            timestamp: doc.get(field::TIMESTAMP).cloned(),
        }
    }

    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert(field::TEMPERATURE.into(), Value::Double(self.temperature));
        fields.insert(field::HUMIDITY.into(), Value::Double(self.humidity));
        fields.insert(field::SENSOR_1.into(), Value::Double(self.sensor1));
        fields.insert(field::SENSOR_2.into(), Value::Double(self.sensor2));
        if let Some(timestamp) = &self.timestamp {
            fields.insert(field::TIMESTAMP.into(), timestamp.clone());
        }
        fields
    }
}

/// 正在采集的目标 (患者, 会话, 子会话)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoringTarget {
    pub patient_id: String,
    pub session_id: String,
    pub subsession_id: String,
}

impl MonitoringTarget {
    pub fn new(
        patient_id: impl Into<String>,
        session_id: impl Into<String>,
        subsession_id: impl Into<String>,
    ) -> Self {
        Self {
            patient_id: patient_id.into(),
            session_id: session_id.into(),
            subsession_id: subsession_id.into(),
        }
    }
}

/// 监测信号：通知设备当前是否应当采样
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoringSignal {
    pub target: MonitoringTarget,
    pub monitoring: bool,
    pub timestamp: String,
}

impl MonitoringSignal {
    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert(field::MONITORING_PATIENT_ID.into(), Value::from(self.target.patient_id.as_str()));
        fields.insert(field::MONITORING_SESSION_ID.into(), Value::from(self.target.session_id.as_str()));
        fields.insert(
            field::MONITORING_SUBSESSION_ID.into(),
            Value::from(self.target.subsession_id.as_str()),
        );
        fields.insert(field::MONITORING.into(), Value::Boolean(self.monitoring));
        fields.insert(field::TIMESTAMP.into(), Value::from(self.timestamp.as_str()));
        fields
    }
}

/// 结果显示请求：让设备在自带屏幕上显示会话汇总
#[derive(Debug, Clone, PartialEq)]
pub struct ResultDisplayRequest {
    pub session_id: String,
    pub timestamp: String,
}

impl ResultDisplayRequest {
    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert(field::MONITORING_SESSION_ID.into(), Value::from(self.session_id.as_str()));
        fields.insert(field::DISPLAY.into(), Value::Boolean(true));
        fields.insert(field::TIMESTAMP.into(), Value::Timestamp(self.timestamp.clone()));
        fields
    }
}
