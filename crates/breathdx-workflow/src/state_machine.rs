//! 采集状态机
//!
//! 管理一次子会话采集的阶段转换。每个阶段声明自己的时长以及进入时、每个节拍上
//! 要执行的信号操作，执行由 [`crate::acquisition::AcquisitionSequencer`] 负责。

use breathdx_core::{BreathDxError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// 采集阶段
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AcquisitionPhase {
    Calibrating,
    Blowing,
    Analyzing,
    Processing,
    Complete,
    Cancelled,
}

impl AcquisitionPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Cancelled)
    }

    /// 操作员看到的阶段提示
    pub fn label(&self) -> &'static str {
        match self {
            Self::Calibrating => "Calibrating sensors",
            Self::Blowing => "Please blow into the device",
            Self::Analyzing => "Analyzing breath sample",
            Self::Processing => "Processing results",
            Self::Complete => "Complete",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for AcquisitionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// 阶段转换事件
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PhaseEvent {
    /// 当前阶段的倒计时结束
    Elapsed,
    /// 操作员停止采集
    Cancel,
}

/// 阶段声明的副作用
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEffect {
    /// 覆盖监测信号
    AnnounceMonitoring(bool),
    ClearMonitoring,
    /// 读取本子会话已写入的读数
    LoadReadings,
    /// 删除子会话（唯一子会话时连同会话）
    DiscardSubsession,
}

/// 阶段时长（节拍数）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseDurations {
    pub calibrating: u32,
    pub blowing: u32,
    pub analyzing: u32,
    pub processing: u32,
}

impl PhaseDurations {
    pub fn total(&self) -> u32 {
        self.calibrating + self.blowing + self.analyzing + self.processing
    }
}

impl Default for PhaseDurations {
    fn default() -> Self {
        Self {
            calibrating: 6,
            blowing: 10,
            analyzing: 35,
            processing: 5,
        }
    }
}

/// 阶段声明
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseSpec {
    pub phase: AcquisitionPhase,
    pub ticks: u32,
    pub on_entry: Vec<PhaseEffect>,
    pub on_tick: Vec<PhaseEffect>,
}

/// 采集状态机
#[derive(Debug)]
pub struct AcquisitionStateMachine {
    transitions: HashMap<(AcquisitionPhase, PhaseEvent), AcquisitionPhase>,
    specs: HashMap<AcquisitionPhase, PhaseSpec>,
}

impl AcquisitionStateMachine {
    /// 创建新的状态机实例
    pub fn new(durations: PhaseDurations) -> Self {
        use AcquisitionPhase::*;

        let mut transitions = HashMap::new();

        // 定义阶段转换规则
        transitions.insert((Calibrating, PhaseEvent::Elapsed), Blowing);
        transitions.insert((Blowing, PhaseEvent::Elapsed), Analyzing);
        transitions.insert((Analyzing, PhaseEvent::Elapsed), Processing);
        transitions.insert((Processing, PhaseEvent::Elapsed), Complete);
        for phase in [Calibrating, Blowing, Analyzing, Processing] {
            transitions.insert((phase, PhaseEvent::Cancel), Cancelled);
        }

        let spec = |phase, ticks, on_entry: Vec<PhaseEffect>, on_tick: Vec<PhaseEffect>| {
            (
                phase,
                PhaseSpec {
                    phase,
                    ticks,
                    on_entry,
                    on_tick,
                },
            )
        };

        let specs = HashMap::from([
            spec(
                Calibrating,
                durations.calibrating,
                vec![],
                vec![PhaseEffect::AnnounceMonitoring(true)],
            ),
            spec(Blowing, durations.blowing, vec![], vec![]),
            spec(Analyzing, durations.analyzing, vec![], vec![]),
            spec(
                Processing,
                durations.processing,
                vec![PhaseEffect::AnnounceMonitoring(false)],
                vec![],
            ),
            spec(
                Complete,
                0,
                vec![PhaseEffect::ClearMonitoring, PhaseEffect::LoadReadings],
                vec![],
            ),
            spec(
                Cancelled,
                0,
                vec![PhaseEffect::ClearMonitoring, PhaseEffect::DiscardSubsession],
                vec![],
            ),
        ]);

        Self { transitions, specs }
    }

    pub fn initial_phase(&self) -> AcquisitionPhase {
        AcquisitionPhase::Calibrating
    }

    /// 检查阶段转换是否有效
    pub fn can_transition(&self, from: &AcquisitionPhase, event: &PhaseEvent) -> bool {
        self.transitions.contains_key(&(*from, *event))
    }

    /// 执行阶段转换
    pub fn transition(&self, from: &AcquisitionPhase, event: &PhaseEvent) -> Result<AcquisitionPhase> {
        match self.transitions.get(&(*from, *event)) {
            Some(to) => Ok(*to),
            None => Err(BreathDxError::InvalidPhaseTransition {
                from: from.to_string(),
                event: format!("{:?}", event),
            }),
        }
    }

    pub fn spec(&self, phase: &AcquisitionPhase) -> Option<&PhaseSpec> {
        self.specs.get(phase)
    }

    /// 正常完成时依次经过的阶段
    pub fn timed_phases(&self) -> Vec<AcquisitionPhase> {
        let mut phases = Vec::new();
        let mut current = self.initial_phase();
        while let Ok(next) = self.transition(&current, &PhaseEvent::Elapsed) {
            phases.push(current);
            current = next;
        }
        phases
    }

    /// 正常完成所需的节拍总数
    pub fn total_ticks(&self) -> u32 {
        self.timed_phases()
            .iter()
            .filter_map(|phase| self.spec(phase))
            .map(|spec| spec.ticks)
            .sum()
    }
}

impl Default for AcquisitionStateMachine {
    fn default() -> Self {
        Self::new(PhaseDurations::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_sequence() {
        let sm = AcquisitionStateMachine::default();

        assert_eq!(
            sm.timed_phases(),
            vec![
                AcquisitionPhase::Calibrating,
                AcquisitionPhase::Blowing,
                AcquisitionPhase::Analyzing,
                AcquisitionPhase::Processing,
            ]
        );
        assert_eq!(sm.total_ticks(), 56);
        assert_eq!(
            sm.transition(&AcquisitionPhase::Processing, &PhaseEvent::Elapsed).unwrap(),
            AcquisitionPhase::Complete
        );
    }

    #[test]
    fn test_cancel_from_every_timed_phase() {
        let sm = AcquisitionStateMachine::default();

        for phase in sm.timed_phases() {
            assert_eq!(
                sm.transition(&phase, &PhaseEvent::Cancel).unwrap(),
                AcquisitionPhase::Cancelled
            );
        }
    }

    #[test]
    fn test_terminal_phases_reject_events() {
        let sm = AcquisitionStateMachine::default();

        assert!(!sm.can_transition(&AcquisitionPhase::Complete, &PhaseEvent::Cancel));
        assert!(!sm.can_transition(&AcquisitionPhase::Cancelled, &PhaseEvent::Elapsed));

        let err = sm
            .transition(&AcquisitionPhase::Complete, &PhaseEvent::Elapsed)
            .unwrap_err();
        assert!(matches!(err, BreathDxError::InvalidPhaseTransition { .. }));
    }

    #[test]
    fn test_phase_effects_declared_as_data() {
        let sm = AcquisitionStateMachine::default();

        let calibrating = sm.spec(&AcquisitionPhase::Calibrating).unwrap();
        assert_eq!(calibrating.ticks, 6);
        assert_eq!(calibrating.on_tick, vec![PhaseEffect::AnnounceMonitoring(true)]);

        let processing = sm.spec(&AcquisitionPhase::Processing).unwrap();
        assert_eq!(processing.on_entry, vec![PhaseEffect::AnnounceMonitoring(false)]);

        let cancelled = sm.spec(&AcquisitionPhase::Cancelled).unwrap();
        assert_eq!(
            cancelled.on_entry,
            vec![PhaseEffect::ClearMonitoring, PhaseEffect::DiscardSubsession]
        );
    }

    #[test]
    fn test_custom_durations() {
        let sm = AcquisitionStateMachine::new(PhaseDurations {
            calibrating: 1,
            blowing: 2,
            analyzing: 3,
            processing: 1,
        });
        assert_eq!(sm.total_ticks(), 7);
    }
}
