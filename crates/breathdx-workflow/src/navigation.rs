//! 页面流转
//!
//! 有限的页面集合加一个导航函数：切换页面时记住上一个页面，并把携带的患者、
//! 子会话和会话上下文合并进当前上下文（未携带的部分保持不变）。

use breathdx_core::Patient;
use serde::{Deserialize, Serialize};

/// 页面
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Page {
    Login,
    CreatePatient,
    PatientCreated,
    Dashboard,
    SessionSetup,
    Acquisition,
    Results,
    SessionSummary,
    Compare,
}

/// 跨页面携带的上下文
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NavigationContext {
    pub patient: Option<Patient>,
    /// 当前子会话 id
    pub subsession_id: Option<String>,
    /// 当前会话 id
    pub session_id: Option<String>,
}

impl NavigationContext {
    pub fn with_patient(patient: Patient) -> Self {
        Self {
            patient: Some(patient),
            ..Default::default()
        }
    }

    pub fn with_subsession(mut self, session_id: impl Into<String>, subsession_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self.subsession_id = Some(subsession_id.into());
        self
    }

    fn merge(&mut self, update: NavigationContext) {
        if update.patient.is_some() {
            self.patient = update.patient;
        }
        if update.subsession_id.is_some() {
            self.subsession_id = update.subsession_id;
        }
        if update.session_id.is_some() {
            self.session_id = update.session_id;
        }
    }
}

/// 页面导航器
#[derive(Debug, Clone, PartialEq)]
pub struct Navigator {
    current: Page,
    previous: Option<Page>,
    context: NavigationContext,
}

impl Navigator {
    pub fn new() -> Self {
        Self {
            current: Page::Login,
            previous: None,
            context: NavigationContext::default(),
        }
    }

    pub fn current(&self) -> Page {
        self.current
    }

    pub fn previous(&self) -> Option<Page> {
        self.previous
    }

    pub fn context(&self) -> &NavigationContext {
        &self.context
    }

    pub fn navigate_to(&mut self, page: Page, update: Option<NavigationContext>) {
        tracing::debug!("Navigate {:?} -> {:?}", self.current, page);
        self.previous = Some(self.current);
        self.current = page;
        if let Some(update) = update {
            self.context.merge(update);
        }
    }

    /// 返回上一个页面，没有记录时保持不动
    pub fn go_back(&mut self) -> Page {
        if let Some(previous) = self.previous {
            self.current = previous;
        }
        self.current
    }
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new()
    }
}
