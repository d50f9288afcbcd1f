//! # BreathDx导出模块
//!
//! 从已读取的会话数据生成导出文件：
//! - 单个子会话的分段文本（会话信息、会话详情、传感器数据）
//! - 单个子会话或整个会话的多工作表布局
//!
//! 工作簿先生成单元格布局，再编码为 xlsx 文件。

pub mod delimited;
pub mod layout;
pub mod workbook;
pub mod writer;

pub use delimited::{subsession_csv, SubsessionCsv};
pub use layout::{SessionExport, SESSION_READING_HEADERS, SUBSESSION_READING_HEADERS};
pub use workbook::{session_workbook, subsession_workbook, Cell, Sheet, Workbook, MAX_SHEET_NAME_LEN};
pub use writer::ExportWriter;
