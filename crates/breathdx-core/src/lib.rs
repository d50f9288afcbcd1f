//! # BreathDx Core
//!
//! 呼气检测客户端的核心模块，提供基础数据结构、错误定义和通用工具。

pub mod error;
pub mod models;
pub mod utils;
pub mod value;

pub use error::{BreathDxError, Result};
pub use models::*;
pub use value::{Document, Fields, Value};
