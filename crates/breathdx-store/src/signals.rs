//! 协调信号
//!
//! 两个固定路径的单例文档充当客户端与设备固件之间的信箱：客户端只写，固件只读。

use breathdx_core::utils::now_iso;
use breathdx_core::{MonitoringSignal, MonitoringTarget, ResultDisplayRequest};
use std::sync::Arc;
use tracing::{info, warn};

use crate::paths::{ACTIVE_MONITORING, RESULT_DISPLAY_REQUEST};
use crate::store::DocumentStore;

/// 协调信号写入器
#[derive(Clone)]
pub struct CoordinationSignals {
    store: Arc<dyn DocumentStore>,
}

impl CoordinationSignals {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// 覆盖监测信号
    pub async fn announce_monitoring(&self, target: &MonitoringTarget, monitoring: bool) -> bool {
        let signal = MonitoringSignal {
            target: target.clone(),
            monitoring,
            timestamp: now_iso(),
        };

        let written = self
            .store
            .create_or_replace(ACTIVE_MONITORING, &signal.to_fields())
            .await;
        if !written {
            warn!(
                "Failed to announce monitoring={} for subsession {}",
                monitoring, target.subsession_id
            );
        }
        written
    }

    /// 删除监测信号
    pub async fn clear_monitoring(&self) -> bool {
        self.store.delete(ACTIVE_MONITORING).await
    }

    /// 请求设备显示会话汇总
    pub async fn request_result_display(&self, session_id: &str) -> bool {
        let request = ResultDisplayRequest {
            session_id: session_id.to_string(),
            timestamp: now_iso(),
        };

        let written = self
            .store
            .create_or_replace(RESULT_DISPLAY_REQUEST, &request.to_fields())
            .await;
        if written {
            info!("Result display requested for session {}", session_id);
        } else {
            warn!("Failed to request result display for session {}", session_id);
        }
        written
    }

    /// 撤销显示请求
    pub async fn clear_result_display(&self) -> bool {
        self.store.delete(RESULT_DISPLAY_REQUEST).await
    }
}
