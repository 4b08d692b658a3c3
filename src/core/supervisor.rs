//! 生成监管：取消令牌、单项目在途限制、违规停写
//!
//! 持有根 CancellationToken（Ctrl+C 时取消所有在途生成）；同一项目同一时刻只允许一次 advance，
//! 第二次请求直接拒绝而不是交错执行；检测到 SequenceViolation 的项目被挂起，直到 reconcile。

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

/// 进程级生成监管
#[derive(Debug, Default)]
pub struct GenerationSupervisor {
    cancel_token: CancellationToken,
    in_flight: Arc<Mutex<HashSet<String>>>,
    halted: Mutex<HashSet<String>>,
}

impl GenerationSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// 触发取消（所有由本监管派生的子 token 一并取消）
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// 创建子 token（用于单次生成调用）
    pub fn child_token(&self) -> CancellationToken {
        self.cancel_token.child_token()
    }

    /// 尝试占用项目；已有在途生成时返回 None
    pub fn try_begin(&self, project_id: &str) -> Option<InFlightGuard> {
        let mut set = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !set.insert(project_id.to_string()) {
            return None;
        }
        Some(InFlightGuard {
            project_id: project_id.to_string(),
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    pub fn is_in_flight(&self, project_id: &str) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(project_id)
    }

    /// 挂起项目写入（持久化不变式被破坏）
    pub fn halt(&self, project_id: &str) {
        self.halted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(project_id.to_string());
    }

    pub fn is_halted(&self, project_id: &str) -> bool {
        self.halted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(project_id)
    }

    /// 解除挂起，返回之前是否处于挂起状态
    pub fn release(&self, project_id: &str) -> bool {
        self.halted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(project_id)
    }
}

/// 在途占用；drop 时释放
#[derive(Debug)]
pub struct InFlightGuard {
    project_id: String,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.project_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_begin_is_rejected_until_guard_dropped() {
        let supervisor = GenerationSupervisor::new();
        let guard = supervisor.try_begin("a").expect("first begin");
        assert!(supervisor.try_begin("a").is_none());
        assert!(supervisor.try_begin("b").is_some());
        drop(guard);
        assert!(!supervisor.is_in_flight("a"));
        assert!(supervisor.try_begin("a").is_some());
    }

    #[test]
    fn test_halt_and_release() {
        let supervisor = GenerationSupervisor::new();
        assert!(!supervisor.is_halted("a"));
        supervisor.halt("a");
        assert!(supervisor.is_halted("a"));
        assert!(supervisor.release("a"));
        assert!(!supervisor.release("a"));
    }

    #[test]
    fn test_cancel_propagates_to_children() {
        let supervisor = GenerationSupervisor::new();
        let child = supervisor.child_token();
        supervisor.cancel();
        assert!(child.is_cancelled());
        assert!(supervisor.is_cancelled());
    }
}
