//! 采集时序
//!
//! 按状态机声明逐阶段推进倒计时，每个节拍等待一个时间单位。
//! 取消只在节拍边界生效，不会打断进行中的文档写入。

use breathdx_core::{MonitoringTarget, Result, SensorReading};
use breathdx_store::{CoordinationSignals, DiscardOutcome, Records};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::state_machine::{
    AcquisitionPhase, AcquisitionStateMachine, PhaseDurations, PhaseEffect, PhaseEvent,
};

/// 采集进度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquisitionProgress {
    pub phase: AcquisitionPhase,
    /// 当前阶段剩余节拍数
    pub remaining: u32,
}

/// 采集结果
#[derive(Debug, Clone, PartialEq)]
pub enum AcquisitionOutcome {
    Completed { readings: Vec<SensorReading> },
    Cancelled { discarded: DiscardOutcome },
}

/// 执行阶段副作用后收集到的数据
#[derive(Default)]
struct EffectResults {
    readings: Option<Vec<SensorReading>>,
    discarded: Option<DiscardOutcome>,
}

/// 采集时序器
pub struct AcquisitionSequencer {
    records: Records,
    signals: CoordinationSignals,
    machine: AcquisitionStateMachine,
    tick: Duration,
}

impl AcquisitionSequencer {
    pub fn new(records: Records, signals: CoordinationSignals, durations: PhaseDurations, tick: Duration) -> Self {
        Self {
            records,
            signals,
            machine: AcquisitionStateMachine::new(durations),
            tick,
        }
    }

    pub fn state_machine(&self) -> &AcquisitionStateMachine {
        &self.machine
    }

    /// 运行一次完整采集
    ///
    /// `cancel` 触发后在下一个节拍边界进入取消阶段；`progress` 接收每个节拍的阶段与剩余时间。
    pub async fn run(
        &self,
        target: &MonitoringTarget,
        cancel: CancellationToken,
        progress: Option<mpsc::UnboundedSender<AcquisitionProgress>>,
    ) -> Result<AcquisitionOutcome> {
        info!(
            "Starting acquisition for {}/{}/{}",
            target.patient_id, target.session_id, target.subsession_id
        );

        let mut phase = self.machine.initial_phase();
        while !phase.is_terminal() {
            let event = self.run_phase(phase, target, &cancel, progress.as_ref()).await;
            let next = self.machine.transition(&phase, &event)?;
            debug!("Acquisition phase {} -> {}", phase, next);
            phase = next;
        }

        let results = self.enter(phase, target).await;
        if let Some(sender) = &progress {
            let _ = sender.send(AcquisitionProgress { phase, remaining: 0 });
        }

        match phase {
            AcquisitionPhase::Cancelled => {
                let discarded = results.discarded.unwrap_or(DiscardOutcome::Subsession);
                info!("Acquisition cancelled for {}", target.subsession_id);
                Ok(AcquisitionOutcome::Cancelled { discarded })
            }
            _ => {
                let readings = results.readings.unwrap_or_default();
                info!(
                    "Acquisition complete for {} with {} readings",
                    target.subsession_id,
                    readings.len()
                );
                Ok(AcquisitionOutcome::Completed { readings })
            }
        }
    }

    /// 运行一个计时阶段，返回离开该阶段的事件
    async fn run_phase(
        &self,
        phase: AcquisitionPhase,
        target: &MonitoringTarget,
        cancel: &CancellationToken,
        progress: Option<&mpsc::UnboundedSender<AcquisitionProgress>>,
    ) -> PhaseEvent {
        if cancel.is_cancelled() {
            return PhaseEvent::Cancel;
        }
        self.enter(phase, target).await;

        let Some(spec) = self.machine.spec(&phase) else {
            return PhaseEvent::Elapsed;
        };

        for remaining in (1..=spec.ticks).rev() {
            if cancel.is_cancelled() {
                return PhaseEvent::Cancel;
            }
            if let Some(sender) = progress {
                let _ = sender.send(AcquisitionProgress { phase, remaining });
            }
            for effect in &spec.on_tick {
                self.apply(*effect, target).await;
            }

            // 整个节拍结束后才检查取消
            tokio::time::sleep(self.tick).await;
        }

        if cancel.is_cancelled() {
            PhaseEvent::Cancel
        } else {
            PhaseEvent::Elapsed
        }
    }

    async fn enter(&self, phase: AcquisitionPhase, target: &MonitoringTarget) -> EffectResults {
        let mut results = EffectResults::default();
        let Some(spec) = self.machine.spec(&phase) else {
            return results;
        };

        for effect in &spec.on_entry {
            match self.apply(*effect, target).await {
                EffectOutput::Readings(readings) => results.readings = Some(readings),
                EffectOutput::Discarded(outcome) => results.discarded = Some(outcome),
                EffectOutput::None => {}
            }
        }
        results
    }

    async fn apply(&self, effect: PhaseEffect, target: &MonitoringTarget) -> EffectOutput {
        match effect {
            PhaseEffect::AnnounceMonitoring(monitoring) => {
                self.signals.announce_monitoring(target, monitoring).await;
                EffectOutput::None
            }
            PhaseEffect::ClearMonitoring => {
                if !self.signals.clear_monitoring().await {
                    warn!("Failed to clear monitoring signal");
                }
                EffectOutput::None
            }
            PhaseEffect::LoadReadings => EffectOutput::Readings(self.records.load_readings(target).await),
            PhaseEffect::DiscardSubsession => {
                EffectOutput::Discarded(self.records.discard_subsession(target).await)
            }
        }
    }
}

enum EffectOutput {
    None,
    Readings(Vec<SensorReading>),
    Discarded(DiscardOutcome),
}
