//! 遗留任务的生命周期状态机
//!
//! ```text
//! Initialized → Started → PreExecuted → Executed → Finished → PostExecuted → Completed
//!      └────────────┴──────────┴────────────┴──────────┴──→ Failed
//! ```
//!
//! 状态表示最近一个已完成的阶段。`Completed` 与 `Failed` 是终止状态。
//! 完成步骤属于清理，失败不会使生命周期进入 `Failed`。

use std::fmt;

use orchestrator_core::{OrchestratorError, OrchestratorResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecyclePhase {
    Initialized,
    Started,
    PreExecuted,
    Executed,
    Finished,
    PostExecuted,
    Completed,
    Failed,
}

impl LifecyclePhase {
    /// 成功路径上的下一个状态
    pub fn next(self) -> Option<LifecyclePhase> {
        use LifecyclePhase::*;
        match self {
            Initialized => Some(Started),
            Started => Some(PreExecuted),
            PreExecuted => Some(Executed),
            Executed => Some(Finished),
            Finished => Some(PostExecuted),
            PostExecuted => Some(Completed),
            Completed | Failed => None,
        }
    }

    /// 从该状态出发的阶段抛出异常时可以进入 `Failed`
    pub fn can_fail(self) -> bool {
        use LifecyclePhase::*;
        matches!(
            self,
            Initialized | Started | PreExecuted | Executed | Finished
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, LifecyclePhase::Completed | LifecyclePhase::Failed)
    }

    /// 从该状态出发时正在执行的步骤名称
    pub fn pending_step(self) -> &'static str {
        use LifecyclePhase::*;
        match self {
            Initialized => "Start",
            Started => "PreExecute",
            PreExecuted => "Execute",
            Executed => "Finish",
            Finished => "PostExecute",
            PostExecuted => "Complete",
            Completed | Failed => "None",
        }
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// 单次执行的生命周期记录
#[derive(Debug, Clone)]
pub struct JobLifecycle {
    phase: LifecyclePhase,
    history: Vec<LifecyclePhase>,
    failed_step: Option<&'static str>,
}

impl JobLifecycle {
    /// 任务实例初始化成功后创建
    pub fn initialized() -> Self {
        Self {
            phase: LifecyclePhase::Initialized,
            history: vec![LifecyclePhase::Initialized],
            failed_step: None,
        }
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.phase
    }

    pub fn history(&self) -> &[LifecyclePhase] {
        &self.history
    }

    /// 失败时正在执行的步骤
    pub fn failed_step(&self) -> Option<&'static str> {
        self.failed_step
    }

    /// 沿成功路径前进一步
    pub fn advance(&mut self, to: LifecyclePhase) -> OrchestratorResult<()> {
        if self.phase.next() != Some(to) {
            return Err(OrchestratorError::Internal(format!(
                "非法的生命周期转换: {} → {}",
                self.phase, to
            )));
        }
        self.phase = to;
        self.history.push(to);
        Ok(())
    }

    /// 进入 `Failed`，记录失败时正在执行的步骤
    pub fn fail(&mut self) -> OrchestratorResult<()> {
        if !self.phase.can_fail() {
            return Err(OrchestratorError::Internal(format!(
                "非法的生命周期转换: {} → {}",
                self.phase,
                LifecyclePhase::Failed
            )));
        }
        self.failed_step = Some(self.phase.pending_step());
        self.phase = LifecyclePhase::Failed;
        self.history.push(LifecyclePhase::Failed);
        Ok(())
    }
}
