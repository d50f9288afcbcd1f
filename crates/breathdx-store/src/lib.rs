//! # BreathDx文档存储模块
//!
//! 通过通用的 REST 文档接口访问远端文档数据库，包括：
//! - 类型化字段线格式与原生值之间的编解码
//! - 按路径寻址的文档读取、列举、写入与删除
//! - 与设备固件之间的协调信号文档
//! - 患者、会话、子会话和传感器读数的记录操作

pub mod error;
pub mod memory;
pub mod paths;
pub mod repository;
pub mod rest;
pub mod signals;
pub mod store;
pub mod wire;

pub use error::StoreError;
pub use memory::{InMemoryDocumentStore, StoreOperation};
pub use repository::{
    DiscardOutcome, PatientRegistration, Records, SessionOverview, SubsessionDetail,
    SubsessionHandle,
};
pub use rest::{RestDocumentStore, RestStoreConfig};
pub use signals::CoordinationSignals;
pub use store::DocumentStore;
