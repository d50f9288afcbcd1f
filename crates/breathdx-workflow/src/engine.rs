//! 门诊工作流引擎
//!
//! 协调记录操作、协调信号、采集时序和结果汇总，对应操作员在每个页面上的动作。

use crate::{
    acquisition::{AcquisitionOutcome, AcquisitionProgress, AcquisitionSequencer},
    navigation::{NavigationContext, Navigator, Page},
    state_machine::PhaseDurations,
};
use breathdx_analysis::{session_metrics, summarize_readings, Aggregate, ComparisonMode, SessionComparison};
use breathdx_core::{
    BreathDxError, Metrics, MonitoringTarget, Patient, PatientInfo, Result, SessionIntake,
    SessionRecord, SubsessionRecord,
};
use breathdx_store::{
    CoordinationSignals, DocumentStore, PatientRegistration, Records, SessionOverview,
    SubsessionDetail, SubsessionHandle,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub const MSG_ENTER_PATIENT_ID: &str = "Please enter a Patient ID";
pub const MSG_PATIENT_NOT_FOUND: &str = "Patient ID not found. Please check and try again.";
pub const MSG_FILL_ALL_FIELDS: &str = "Please fill in all fields";
pub const MSG_SESSION_CREATION_FAILED: &str = "Error creating session. Please try again.";
pub const MSG_SELECT_BOTH_SESSIONS: &str = "Please select both sessions to compare";

/// 提取给操作员看的简短信息
pub fn operator_message(err: &BreathDxError) -> String {
    match err {
        BreathDxError::Validation(msg) | BreathDxError::NotFound(msg) | BreathDxError::Workflow(msg) => {
            msg.clone()
        }
        other => other.to_string(),
    }
}

/// 工作流时序设置
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkflowSettings {
    pub durations: PhaseDurations,
    pub tick: Duration,
    /// 计算结果前等待设备写完最后一批读数
    pub results_settle: Duration,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            durations: PhaseDurations::default(),
            tick: Duration::from_secs(1),
            results_settle: Duration::from_secs(2),
        }
    }
}

/// 患者登记表单（原始输入）
#[derive(Debug, Clone, Default)]
pub struct PatientForm {
    pub name: String,
    pub age: String,
    pub sex: String,
    pub mobile: String,
    pub married: String,
}

impl PatientForm {
    pub fn validate(&self) -> Result<PatientInfo> {
        let fields = [&self.name, &self.age, &self.sex, &self.mobile, &self.married];
        if fields.iter().any(|f| f.trim().is_empty()) {
            return Err(BreathDxError::Validation(MSG_FILL_ALL_FIELDS.to_string()));
        }

        let age = self
            .age
            .trim()
            .parse::<i64>()
            .map_err(|_| BreathDxError::Validation(format!("Invalid age: {}", self.age)))?;

        Ok(PatientInfo {
            name: self.name.clone(),
            age,
            sex: self.sex.clone(),
            mobile: self.mobile.clone(),
            married: self.married.clone(),
        })
    }
}

/// 会话登记表单（原始输入）
#[derive(Debug, Clone, Default)]
pub struct SessionForm {
    pub meal_time: String,
    pub alcohol_consumption: String,
    pub blood_glucose: String,
    pub session_duration: String,
}

impl SessionForm {
    pub fn validate(&self) -> Result<SessionIntake> {
        let fields = [
            &self.meal_time,
            &self.alcohol_consumption,
            &self.blood_glucose,
            &self.session_duration,
        ];
        if fields.iter().any(|f| f.trim().is_empty()) {
            return Err(BreathDxError::Validation(MSG_FILL_ALL_FIELDS.to_string()));
        }

        let blood_glucose = self
            .blood_glucose
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| {
                BreathDxError::Validation(format!("Invalid blood glucose: {}", self.blood_glucose))
            })?;

        Ok(SessionIntake {
            meal_time: self.meal_time.clone(),
            alcohol_consumption: self.alcohol_consumption.clone(),
            blood_glucose,
            session_duration: self.session_duration.clone(),
        })
    }
}

/// 登录结果
#[derive(Debug, Clone, PartialEq)]
pub struct LoginOutcome {
    pub patient: Patient,
    pub session_count: usize,
}

/// 子会话结果
#[derive(Debug, Clone, PartialEq)]
pub struct SubsessionResult {
    pub target: MonitoringTarget,
    pub aggregate: Aggregate,
}

impl SubsessionResult {
    pub fn metrics(&self) -> Metrics {
        self.aggregate.metrics()
    }

    pub fn warning(&self) -> Option<&'static str> {
        self.aggregate.warning()
    }
}

/// 会话汇总
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub session_id: String,
    /// 没有任何已完成子会话时为 None
    pub metrics: Option<Metrics>,
    pub completed: Vec<SubsessionRecord>,
    /// 设备显示请求是否写入成功
    pub display_requested: bool,
}

/// 门诊工作流引擎
pub struct ClinicWorkflow {
    records: Records,
    signals: CoordinationSignals,
    settings: WorkflowSettings,
    navigator: Navigator,
}

impl ClinicWorkflow {
    pub fn new(store: Arc<dyn DocumentStore>, settings: WorkflowSettings) -> Self {
        tracing::info!("Clinic workflow using document store '{}'", store.name());
        Self {
            records: Records::new(store.clone()),
            signals: CoordinationSignals::new(store),
            settings,
            navigator: Navigator::new(),
        }
    }

    pub fn records(&self) -> &Records {
        &self.records
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    // ========== 登录与登记 ==========

    /// 按患者编号登录
    pub async fn login(&mut self, patient_id: &str) -> Result<LoginOutcome> {
        let patient_id = patient_id.trim();
        if patient_id.is_empty() {
            return Err(BreathDxError::Validation(MSG_ENTER_PATIENT_ID.to_string()));
        }

        let patient = self
            .records
            .find_patient(patient_id)
            .await
            .ok_or_else(|| BreathDxError::NotFound(MSG_PATIENT_NOT_FOUND.to_string()))?;
        let session_count = self.records.list_sessions(patient_id).await.len();

        tracing::info!("Patient {} logged in with {} sessions", patient.id, session_count);
        self.navigator
            .navigate_to(Page::Dashboard, Some(NavigationContext::with_patient(patient.clone())));

        Ok(LoginOutcome {
            patient,
            session_count,
        })
    }

    /// 登记患者，信息完全一致时复用已有编号
    pub async fn register_patient(&mut self, form: &PatientForm) -> Result<PatientRegistration> {
        let info = form.validate()?;
        let registration = self.records.register_patient(&info).await?;

        self.navigator.navigate_to(
            Page::PatientCreated,
            Some(NavigationContext::with_patient(registration.patient.clone())),
        );
        Ok(registration)
    }

    // ========== 会话与采集 ==========

    /// 创建会话及第一个子会话
    pub async fn start_session(&mut self, patient: &Patient, form: &SessionForm) -> Result<SubsessionHandle> {
        let intake = form.validate()?;
        let handle = self
            .records
            .create_session(patient, &intake)
            .await
            .map_err(|err| {
                tracing::warn!("Session creation failed: {}", err);
                BreathDxError::Workflow(MSG_SESSION_CREATION_FAILED.to_string())
            })?;

        self.enter_acquisition(patient, &handle);
        Ok(handle)
    }

    /// 重新采集：在同一会话下创建下一个子会话
    pub async fn retake(&mut self, patient: &Patient, session_id: &str) -> Result<SubsessionHandle> {
        let handle = self.records.create_next_subsession(&patient.id, session_id).await?;
        tracing::info!(
            "Retake {} for session {}",
            handle.target.subsession_id,
            session_id
        );

        self.enter_acquisition(patient, &handle);
        Ok(handle)
    }

    fn enter_acquisition(&mut self, patient: &Patient, handle: &SubsessionHandle) {
        let context = NavigationContext::with_patient(patient.clone())
            .with_subsession(handle.target.session_id.clone(), handle.target.subsession_id.clone());
        self.navigator.navigate_to(Page::Acquisition, Some(context));
    }

    pub fn sequencer(&self) -> AcquisitionSequencer {
        AcquisitionSequencer::new(
            self.records.clone(),
            self.signals.clone(),
            self.settings.durations,
            self.settings.tick,
        )
    }

    /// 运行采集时序；完成后进入结果页，取消后回到登录页
    pub async fn acquire(
        &mut self,
        target: &MonitoringTarget,
        cancel: CancellationToken,
        progress: Option<mpsc::UnboundedSender<AcquisitionProgress>>,
    ) -> Result<AcquisitionOutcome> {
        let outcome = self.sequencer().run(target, cancel, progress).await?;

        match &outcome {
            AcquisitionOutcome::Completed { .. } => self.navigator.navigate_to(Page::Results, None),
            AcquisitionOutcome::Cancelled { .. } => self.navigator.navigate_to(Page::Login, None),
        }
        Ok(outcome)
    }

    // ========== 结果 ==========

    /// 计算子会话结果并写回子会话文档；没有读数时不写入
    pub async fn compute_results(&mut self, target: &MonitoringTarget) -> Result<SubsessionResult> {
        tokio::time::sleep(self.settings.results_settle).await;

        let readings = self.records.load_readings(target).await;
        let aggregate = summarize_readings(&readings);

        if let Aggregate::Computed { metrics, .. } = &aggregate {
            self.records.save_subsession_result(target, metrics).await?;
        } else {
            tracing::warn!("No readings for {}", target.subsession_id);
        }

        Ok(SubsessionResult {
            target: target.clone(),
            aggregate,
        })
    }

    /// 汇总会话并请求设备显示
    pub async fn summarize_session(&mut self, patient: &Patient, session_id: &str) -> Result<SessionSummary> {
        let subsessions = self.records.list_subsessions(&patient.id, session_id).await;
        let completed: Vec<SubsessionRecord> = subsessions
            .into_iter()
            .filter(|s| s.metrics.is_some())
            .collect();

        let metrics = session_metrics(&completed);
        let mut display_requested = false;
        if let Some(metrics) = &metrics {
            self.records
                .save_session_result(patient, session_id, metrics, completed.len())
                .await?;
            display_requested = self.signals.request_result_display(session_id).await;
        }

        self.navigator.navigate_to(Page::SessionSummary, None);
        Ok(SessionSummary {
            session_id: session_id.to_string(),
            metrics,
            completed,
            display_requested,
        })
    }

    /// 离开结果页：撤销显示请求并回到仪表盘
    pub async fn leave_results(&mut self) -> bool {
        let cleared = self.signals.clear_result_display().await;
        if !cleared {
            tracing::warn!("Failed to clear display request");
        }
        self.navigator.navigate_to(Page::Dashboard, None);
        cleared
    }

    // ========== 仪表盘与对比 ==========

    pub async fn dashboard(&mut self, patient_id: &str) -> Vec<SessionOverview> {
        let overviews = self.records.session_overviews(patient_id).await;
        self.navigator.navigate_to(Page::Dashboard, None);
        overviews
    }

    pub async fn session_details(&self, patient_id: &str, session_id: &str) -> Vec<SubsessionDetail> {
        self.records.subsession_details(patient_id, session_id).await
    }

    /// 可参与对比的会话（已带汇总结果）
    pub async fn comparison_candidates(&self, patient_id: &str) -> Vec<SessionRecord> {
        self.records.sessions_with_results(patient_id).await
    }

    /// 对比两次会话，参数为 (患者编号, 会话编号)
    pub async fn compare(
        &mut self,
        first: Option<(&str, &str)>,
        second: Option<(&str, &str)>,
    ) -> Result<SessionComparison> {
        let (Some(first), Some(second)) = (first, second) else {
            return Err(BreathDxError::Validation(MSG_SELECT_BOTH_SESSIONS.to_string()));
        };

        let mode = if first.0 == second.0 {
            ComparisonMode::SamePatient
        } else {
            ComparisonMode::DifferentPatients
        };

        let first_session = self.load_compared(first).await?;
        let second_session = self.load_compared(second).await?;

        let comparison = SessionComparison::between(mode, first_session, second_session)
            .ok_or_else(|| BreathDxError::Workflow("Session has no results".to_string()))?;

        self.navigator.navigate_to(Page::Compare, None);
        Ok(comparison)
    }

    async fn load_compared(&self, (patient_id, session_id): (&str, &str)) -> Result<SessionRecord> {
        self.records
            .find_session(patient_id, session_id)
            .await
            .ok_or_else(|| BreathDxError::NotFound(format!("Session {}/{}", patient_id, session_id)))
    }
}
