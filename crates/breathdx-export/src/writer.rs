//! 导出文件写入

use breathdx_core::{BreathDxError, Result, SensorReading};
use rust_xlsxwriter::{Workbook as XlsxWorkbook, XlsxError};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::delimited::subsession_csv;
use crate::layout::SessionExport;
use crate::workbook::{Cell, Workbook};

/// 导出写入器
#[derive(Debug, Clone)]
pub struct ExportWriter {
    output_dir: PathBuf,
}

impl ExportWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// `{patient}_{session}_{subsession}`
    pub fn subsession_stem(export: &SessionExport<'_>, subsession_id: &str) -> String {
        format!("{}_{}_{}", export.patient.id, export.session_id, subsession_id)
    }

    /// `{patient}_{session}_complete`
    pub fn session_stem(export: &SessionExport<'_>) -> String {
        format!("{}_{}_complete", export.patient.id, export.session_id)
    }

    /// 写出子会话分段文本，返回文件路径
    pub async fn write_subsession_csv(
        &self,
        export: &SessionExport<'_>,
        subsession_id: &str,
        readings: &[SensorReading],
    ) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.output_dir).await?;

        let path = self
            .output_dir
            .join(format!("{}.csv", Self::subsession_stem(export, subsession_id)));
        tokio::fs::write(&path, subsession_csv(export, subsession_id, readings)).await?;

        info!("Exported {} readings to {}", readings.len(), path.display());
        Ok(path)
    }

    /// 写出 `{stem}.xlsx`，每个工作表对应一个 worksheet
    pub async fn write_workbook(&self, stem: &str, workbook: &Workbook) -> Result<PathBuf> {
        if workbook.sheets().is_empty() {
            return Err(BreathDxError::Export(format!("工作簿 {} 没有工作表", stem)));
        }

        let bytes = encode_xlsx(workbook)
            .map_err(|e| BreathDxError::Export(format!("工作簿 {} 编码失败: {}", stem, e)))?;

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self.output_dir.join(format!("{}.xlsx", stem));
        tokio::fs::write(&path, bytes).await?;

        info!(
            "Exported workbook with {} sheets to {}",
            workbook.sheets().len(),
            path.display()
        );
        Ok(path)
    }
}

fn encode_xlsx(workbook: &Workbook) -> std::result::Result<Vec<u8>, XlsxError> {
    let mut book = XlsxWorkbook::new();

    for sheet in workbook.sheets() {
        let worksheet = book.add_worksheet();
        worksheet.set_name(sheet.name())?;

        for (row, cells) in (0u32..).zip(sheet.rows()) {
            for (col, cell) in (0u16..).zip(cells) {
                match cell {
                    Cell::Empty => {}
                    Cell::Text(text) => {
                        worksheet.write_string(row, col, text.as_str())?;
                    }
                    Cell::Number(number) => {
                        worksheet.write_number(row, col, *number)?;
                    }
                }
            }
        }
    }

    book.save_to_buffer()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workbook::{session_workbook, subsession_workbook, Sheet};
    use breathdx_core::{Patient, PatientInfo, SubsessionRecord};
    use breathdx_store::SubsessionDetail;
    use calamine::{open_workbook, Data, Reader, Xlsx};

    fn patient() -> Patient {
        Patient {
            id: "P-4".into(),
            info: PatientInfo {
                name: "A".into(),
                age: 30,
                sex: "Male".into(),
                mobile: "123".into(),
                married: "Single".into(),
            },
            created_at: None,
        }
    }

    #[tokio::test]
    async fn test_write_csv_and_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ExportWriter::new(dir.path().join("exports"));
        let patient = patient();
        let export = SessionExport::new(&patient, "sessionID_002", None);
        let readings = vec![SensorReading::new(36.0, 40.0, 100.0, 200.0)];

        let csv = writer
            .write_subsession_csv(&export, "subsession_001", &readings)
            .await
            .unwrap();
        assert_eq!(
            csv.file_name().unwrap().to_str(),
            Some("P-4_sessionID_002_subsession_001.csv")
        );
        let text = std::fs::read_to_string(&csv).unwrap();
        assert!(text.starts_with("=== SESSION INFORMATION ==="));

        let workbook = subsession_workbook(&export, "subsession_001", &readings);
        let stem = ExportWriter::subsession_stem(&export, "subsession_001");
        let out = writer.write_workbook(&stem, &workbook).await.unwrap();
        assert_eq!(
            out.file_name().unwrap().to_str(),
            Some("P-4_sessionID_002_subsession_001.xlsx")
        );

        let mut book: Xlsx<_> = open_workbook(&out).unwrap();
        assert_eq!(book.sheet_names(), vec!["Session Info", "Sensor Data"]);

        let data = book.worksheet_range("Sensor Data").unwrap();
        assert_eq!(data.get_value((0, 2)), Some(&Data::String("SGP40".into())));
        assert_eq!(data.get_value((0, 3)), Some(&Data::String("MQ2".into())));
        assert_eq!(data.get_value((1, 0)), Some(&Data::Float(36.0)));
        assert_eq!(data.get_value((1, 3)), Some(&Data::Float(200.0)));

        let info = book.worksheet_range("Session Info").unwrap();
        assert_eq!(info.get_value((0, 1)), Some(&Data::String("A".into())));
    }

    #[tokio::test]
    async fn test_complete_session_workbook_file() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ExportWriter::new(dir.path());
        let patient = patient();
        let export = SessionExport::new(&patient, "sessionID_001", None);
        let details = vec![SubsessionDetail {
            subsession: SubsessionRecord {
                id: "subsession_001".into(),
                status: None,
                timestamp: None,
                metrics: None,
            },
            readings: vec![SensorReading::new(36.0, 40.0, 100.0, 200.0)],
        }];

        let workbook = session_workbook(&export, &details);
        let out = writer
            .write_workbook(&ExportWriter::session_stem(&export), &workbook)
            .await
            .unwrap();
        assert_eq!(
            out.file_name().unwrap().to_str(),
            Some("P-4_sessionID_001_complete.xlsx")
        );

        let mut book: Xlsx<_> = open_workbook(&out).unwrap();
        assert_eq!(book.sheet_names(), vec!["Session Info", "subsession_001"]);
        let data = book.worksheet_range("subsession_001").unwrap();
        assert_eq!(data.get_value((0, 2)), Some(&Data::String("SENSOR_1".into())));
    }

    #[tokio::test]
    async fn test_invalid_sheet_name_is_export_error() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ExportWriter::new(dir.path());
        let mut workbook = Workbook::new();
        workbook.add_sheet(Sheet::new("bad[name]"));

        let err = writer.write_workbook("bad", &workbook).await.unwrap_err();
        assert!(matches!(err, BreathDxError::Export(_)));
        assert!(!dir.path().join("bad.xlsx").exists());
    }

    #[tokio::test]
    async fn test_empty_workbook_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ExportWriter::new(dir.path());
        let err = writer.write_workbook("empty", &Workbook::new()).await.unwrap_err();
        assert!(matches!(err, BreathDxError::Export(_)));
    }
}
