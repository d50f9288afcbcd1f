//! # BreathDx工作流模块
//!
//! 提供门诊检测流程中与界面无关的全部逻辑，包括：
//! - 采集状态机：声明各阶段时长与信号操作
//! - 采集时序：按节拍推进阶段，支持操作员取消
//! - 页面流转：页面切换与上下文携带
//! - 工作流引擎：登录、登记、会话、结果、汇总与对比

pub mod acquisition;
pub mod engine;
pub mod navigation;
pub mod state_machine;

// 重新导出主要类型
pub use acquisition::{AcquisitionOutcome, AcquisitionProgress, AcquisitionSequencer};
pub use engine::{
    operator_message, ClinicWorkflow, LoginOutcome, PatientForm, SessionForm, SessionSummary,
    SubsessionResult, WorkflowSettings,
};
pub use navigation::{NavigationContext, Navigator, Page};
pub use state_machine::{
    AcquisitionPhase, AcquisitionStateMachine, PhaseDurations, PhaseEffect, PhaseEvent, PhaseSpec,
};
