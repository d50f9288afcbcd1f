//! 多工作表布局

use breathdx_core::SensorReading;
use breathdx_store::SubsessionDetail;

use crate::layout::{
    reading_row, SessionExport, SESSION_READING_HEADERS, SUBSESSION_READING_HEADERS,
};

/// 工作表名称的最大长度
pub const MAX_SHEET_NAME_LEN: usize = 31;

pub const SESSION_INFO_SHEET: &str = "Session Info";
pub const SENSOR_DATA_SHEET: &str = "Sensor Data";

/// 单元格
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }
}

/// 工作表
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    name: String,
    rows: Vec<Vec<Cell>>,
}

impl Sheet {
    /// 名称超长时截断
    pub fn new(name: &str) -> Self {
        Self {
            name: name.chars().take(MAX_SHEET_NAME_LEN).collect(),
            rows: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn push_row(&mut self, row: Vec<Cell>) {
        self.rows.push(row);
    }

    fn push_pair(&mut self, label: &str, value: Cell) {
        self.rows.push(vec![Cell::text(label), value]);
    }

    fn push_blank(&mut self) {
        self.rows.push(vec![Cell::Empty]);
    }
}

/// 工作簿
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sheet(&mut self, sheet: Sheet) {
        self.sheets.push(sheet);
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }
}

fn info_sheet(export: &SessionExport<'_>, subsession_id: Option<&str>) -> Sheet {
    let mut sheet = Sheet::new(SESSION_INFO_SHEET);
    sheet.push_pair("Patient Name", Cell::text(export.patient_name()));
    sheet.push_pair("Patient ID", Cell::text(export.patient_id()));
    sheet.push_pair("Session ID", Cell::text(export.session_id));
    if let Some(subsession_id) = subsession_id {
        sheet.push_pair("Subsession ID", Cell::text(subsession_id));
    }
    sheet.push_blank();
    sheet.push_row(vec![Cell::text("Session Details")]);

    let glucose = export.session.and_then(|s| s.blood_glucose);
    for (label, value) in export.detail_rows() {
        let cell = match (label, glucose) {
            ("Blood Glucose Level (mg/dL)", Some(g)) => Cell::Number(g),
            _ => Cell::Text(value),
        };
        sheet.push_pair(label, cell);
    }
    sheet
}

fn readings_sheet(name: &str, headers: &[&str; 5], readings: &[SensorReading]) -> Sheet {
    let mut sheet = Sheet::new(name);
    sheet.push_row(headers.iter().map(|h| Cell::text(*h)).collect());
    for reading in readings {
        let [.., timestamp] = reading_row(reading);
        sheet.push_row(vec![
            Cell::Number(reading.temperature),
            Cell::Number(reading.humidity),
            Cell::Number(reading.sensor1),
            Cell::Number(reading.sensor2),
            Cell::Text(timestamp),
        ]);
    }
    sheet
}

/// 单个子会话：会话信息 + 传感器数据
pub fn subsession_workbook(export: &SessionExport<'_>, subsession_id: &str, readings: &[SensorReading]) -> Workbook {
    let mut workbook = Workbook::new();
    workbook.add_sheet(info_sheet(export, Some(subsession_id)));
    workbook.add_sheet(readings_sheet(SENSOR_DATA_SHEET, &SUBSESSION_READING_HEADERS, readings));
    workbook
}

/// 整个会话：会话信息（含子会话总数）+ 每个有读数的子会话一个工作表
pub fn session_workbook(export: &SessionExport<'_>, details: &[SubsessionDetail]) -> Workbook {
    let mut info = info_sheet(export, None);
    info.push_blank();
    info.push_pair("Total Subsessions", Cell::Number(details.len() as f64));

    let mut workbook = Workbook::new();
    workbook.add_sheet(info);
    for detail in details.iter().filter(|d| !d.readings.is_empty()) {
        workbook.add_sheet(readings_sheet(
            &detail.subsession.id,
            &SESSION_READING_HEADERS,
            &detail.readings,
        ));
    }
    workbook
}
