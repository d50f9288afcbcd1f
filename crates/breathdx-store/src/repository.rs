//! 记录操作
//!
//! 在文档存储之上实现患者、会话、子会话与读数的读写。
//!
//! 序号分配都是"先读后写"，没有原子自增：并发创建可能得到重复编号。

use breathdx_core::utils::{now_iso, patient_id, patient_number, session_id, subsession_id};
use breathdx_core::{
    field, BreathDxError, Fields, Metrics, MonitoringTarget, Patient, PatientInfo, Result,
    SensorReading, SessionIntake, SessionRecord, SubsessionRecord, SubsessionStatus, Value,
};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::paths;
use crate::store::DocumentStore;

/// 患者登记结果
#[derive(Debug, Clone, PartialEq)]
pub struct PatientRegistration {
    pub patient: Patient,
    /// 是否复用了已有患者
    pub existing: bool,
}

/// 新建子会话的定位信息
#[derive(Debug, Clone, PartialEq)]
pub struct SubsessionHandle {
    pub target: MonitoringTarget,
    /// 在会话中的序号，从 1 开始
    pub number: usize,
}

/// 会话列表项
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOverview {
    pub session: SessionRecord,
    pub subsession_count: usize,
}

/// 子会话及其读数
#[derive(Debug, Clone, PartialEq)]
pub struct SubsessionDetail {
    pub subsession: SubsessionRecord,
    pub readings: Vec<SensorReading>,
}

/// 取消采集时删除了什么
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardOutcome {
    /// 唯一的子会话被删除，会话本身也一并删除
    Session,
    /// 只删除了该子会话
    Subsession,
}

/// 记录操作接口
#[derive(Clone)]
pub struct Records {
    store: Arc<dyn DocumentStore>,
}

impl Records {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    // ========== 患者相关操作 ==========

    /// 查找患者，文档不存在、读取失败或缺少 `basic_info` 都返回 None
    pub async fn find_patient(&self, patient_id: &str) -> Option<Patient> {
        if !paths::is_document_id(patient_id) {
            debug!("Rejected patient id {:?}", patient_id);
            return None;
        }
        let document = self.store.get_document(&paths::patient(patient_id)).await?;
        Patient::from_document(&document)
    }

    /// 登记患者
    ///
    /// 五项基本信息与已有患者完全一致时复用其编号且不写入；否则在现有最大序号上加一创建。
    pub async fn register_patient(&self, info: &PatientInfo) -> Result<PatientRegistration> {
        let documents = self.store.list_collection(paths::PATIENTS).await;

        let mut max_number = 0;
        let mut existing = None;
        for document in &documents {
            if let Some(number) = patient_number(&document.id) {
                max_number = max_number.max(number);
            }
            if let Some(patient) = Patient::from_document(document) {
                if patient.info == *info {
                    existing = Some(patient);
                }
            }
        }

        if let Some(patient) = existing {
            info!("Reusing existing patient {}", patient.id);
            return Ok(PatientRegistration {
                patient,
                existing: true,
            });
        }

        let id = patient_id(max_number + 1);
        let created_at = now_iso();
        let mut fields = Fields::new();
        fields.insert(field::BASIC_INFO.into(), Value::Map(info.to_fields(&created_at)));

        let path = paths::patient(&id);
        if !self.store.create_or_replace(&path, &fields).await {
            return Err(BreathDxError::WriteFailed { path });
        }

        info!("Created patient {}", id);
        Ok(PatientRegistration {
            patient: Patient {
                id,
                info: info.clone(),
                created_at: Some(created_at),
            },
            existing: false,
        })
    }

    // ========== 会话相关操作 ==========

    pub async fn list_sessions(&self, patient_id: &str) -> Vec<SessionRecord> {
        self.store
            .list_collection(&paths::sessions(patient_id))
            .await
            .iter()
            .map(SessionRecord::from_document)
            .collect()
    }

    /// 已带汇总结果（存在 `avgTemp`）的会话
    pub async fn sessions_with_results(&self, patient_id: &str) -> Vec<SessionRecord> {
        self.list_sessions(patient_id)
            .await
            .into_iter()
            .filter(SessionRecord::has_result)
            .collect()
    }

    pub async fn find_session(&self, patient_id: &str, session_id: &str) -> Option<SessionRecord> {
        self.store
            .get_document(&paths::session(patient_id, session_id))
            .await
            .map(|document| SessionRecord::from_document(&document))
    }

    /// 会话列表及各自的子会话数，子会话集合并发读取
    pub async fn session_overviews(&self, patient_id: &str) -> Vec<SessionOverview> {
        let sessions = self.list_sessions(patient_id).await;

        let counts = join_all(sessions.iter().map(|session| async move {
            self.store
                .list_collection(&paths::subsessions(patient_id, &session.id))
                .await
                .len()
        }))
        .await;

        sessions
            .into_iter()
            .zip(counts)
            .map(|(session, subsession_count)| SessionOverview {
                session,
                subsession_count,
            })
            .collect()
    }

    /// 创建会话及其第一个子会话
    pub async fn create_session(
        &self,
        patient: &Patient,
        intake: &SessionIntake,
    ) -> Result<SubsessionHandle> {
        let existing = self.store.list_collection(&paths::sessions(&patient.id)).await;
        let session_id = session_id(existing.len() + 1);

        let mut fields = Fields::new();
        fields.insert(field::SESSION_ID.into(), Value::from(session_id.as_str()));
        fields.insert(field::PATIENT_NAME.into(), Value::from(patient.info.name.as_str()));
        fields.insert(field::PATIENT_ID.into(), Value::from(patient.id.as_str()));
        fields.insert(field::MEAL_TIME.into(), Value::from(intake.meal_time.as_str()));
        fields.insert(
            field::ALCOHOL_CONSUMPTION.into(),
            Value::from(intake.alcohol_consumption.as_str()),
        );
        fields.insert(field::BLOOD_GLUCOSE.into(), Value::Double(intake.blood_glucose));
        fields.insert(
            field::SESSION_DURATION.into(),
            Value::from(intake.session_duration.as_str()),
        );
        fields.insert(field::CREATED_AT.into(), Value::from(now_iso()));

        let path = paths::session(&patient.id, &session_id);
        if !self.store.create_or_replace(&path, &fields).await {
            return Err(BreathDxError::WriteFailed { path });
        }
        info!("Created session {} for patient {}", session_id, patient.id);

        self.open_subsession(&patient.id, &session_id, 1).await
    }

    /// 保存会话汇总：先读取会话文档，保留全部已有字段，再叠加结果字段整体写回
    pub async fn save_session_result(
        &self,
        patient: &Patient,
        session_id: &str,
        metrics: &Metrics,
        subsession_count: usize,
    ) -> Result<()> {
        let path = paths::session(&patient.id, session_id);
        let mut fields = self
            .store
            .get_document(&path)
            .await
            .map(|document| document.fields)
            .unwrap_or_default();

        fields
            .entry(field::SESSION_ID.to_string())
            .or_insert_with(|| Value::from(session_id));
        fields
            .entry(field::PATIENT_NAME.to_string())
            .or_insert_with(|| Value::from(patient.info.name.as_str()));
        fields
            .entry(field::PATIENT_ID.to_string())
            .or_insert_with(|| Value::from(patient.id.as_str()));

        metrics.write_into(&mut fields);
        fields.insert(field::SUBSESSION_COUNT.into(), Value::from(subsession_count));
        fields.insert(field::RESULTS_TIMESTAMP.into(), Value::from(now_iso()));
        fields.insert(
            field::STATUS.into(),
            Value::from(SubsessionStatus::Completed.as_str()),
        );

        if !self.store.merge_update(&path, &fields).await {
            return Err(BreathDxError::WriteFailed { path });
        }
        info!("Saved session result for {}", session_id);
        Ok(())
    }

    // ========== 子会话相关操作 ==========

    pub async fn list_subsessions(&self, patient_id: &str, session_id: &str) -> Vec<SubsessionRecord> {
        self.store
            .list_collection(&paths::subsessions(patient_id, session_id))
            .await
            .iter()
            .map(SubsessionRecord::from_document)
            .collect()
    }

    /// 重新采集：按当前子会话数加一创建下一个子会话
    pub async fn create_next_subsession(
        &self,
        patient_id: &str,
        session_id: &str,
    ) -> Result<SubsessionHandle> {
        let existing = self
            .store
            .list_collection(&paths::subsessions(patient_id, session_id))
            .await;
        self.open_subsession(patient_id, session_id, existing.len() + 1)
            .await
    }

    async fn open_subsession(
        &self,
        patient_id: &str,
        session_id: &str,
        number: usize,
    ) -> Result<SubsessionHandle> {
        let id = subsession_id(number);
        let fields = SubsessionRecord::fields(&id, SubsessionStatus::InProgress, &now_iso(), None);

        let path = paths::subsession(patient_id, session_id, &id);
        if !self.store.create_or_replace(&path, &fields).await {
            return Err(BreathDxError::WriteFailed { path });
        }
        debug!("Opened subsession {}", path);

        Ok(SubsessionHandle {
            target: MonitoringTarget::new(patient_id, session_id, id),
            number,
        })
    }

    /// 读取子会话的传感器读数
    pub async fn load_readings(&self, target: &MonitoringTarget) -> Vec<SensorReading> {
        self.store
            .list_collection(&paths::sensor_data(
                &target.patient_id,
                &target.session_id,
                &target.subsession_id,
            ))
            .await
            .iter()
            .map(SensorReading::from_document)
            .collect()
    }

    /// 会话中每个子会话及其读数，读数集合并发读取
    pub async fn subsession_details(&self, patient_id: &str, session_id: &str) -> Vec<SubsessionDetail> {
        let subsessions = self.list_subsessions(patient_id, session_id).await;

        join_all(subsessions.into_iter().map(|subsession| async move {
            let target = MonitoringTarget::new(patient_id, session_id, subsession.id.as_str());
            let readings = self.load_readings(&target).await;
            SubsessionDetail {
                subsession,
                readings,
            }
        }))
        .await
    }

    /// 保存子会话结果，整体替换子会话文档并标记为完成
    pub async fn save_subsession_result(&self, target: &MonitoringTarget, metrics: &Metrics) -> Result<()> {
        let fields = SubsessionRecord::fields(
            &target.subsession_id,
            SubsessionStatus::Completed,
            &now_iso(),
            Some(metrics),
        );

        let path = paths::subsession(&target.patient_id, &target.session_id, &target.subsession_id);
        if !self.store.create_or_replace(&path, &fields).await {
            return Err(BreathDxError::WriteFailed { path });
        }
        info!("Saved subsession result for {}", path);
        Ok(())
    }

    /// 丢弃子会话
    ///
    /// 若它是会话中唯一的子会话，会话文档一并删除。设备已写入的读数不会被清理。
    pub async fn discard_subsession(&self, target: &MonitoringTarget) -> DiscardOutcome {
        let subsessions = self
            .store
            .list_collection(&paths::subsessions(&target.patient_id, &target.session_id))
            .await;

        let subsession_path =
            paths::subsession(&target.patient_id, &target.session_id, &target.subsession_id);
        if !self.store.delete(&subsession_path).await {
            warn!("Failed to delete subsession {}", subsession_path);
        }

        let sole = subsessions.len() == 1 && subsessions[0].id == target.subsession_id;
        if !sole {
            return DiscardOutcome::Subsession;
        }

        let session_path = paths::session(&target.patient_id, &target.session_id);
        if !self.store.delete(&session_path).await {
            warn!("Failed to delete session {}", session_path);
        }
        info!("Discarded session {} with its only subsession", target.session_id);
        DiscardOutcome::Session
    }
}
