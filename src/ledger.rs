// ledger.rs: GPU 句柄计数
//
// 每个由本 crate 创建的 GPU 对象都持有一个 LiveHandle，drop 时计数减一。
// 用于验证失败路径上没有遗留的 stage / program / texture / target。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    Stage,
    Program,
    Texture,
    Target,
}

impl HandleKind {
    pub const ALL: [HandleKind; 4] = [
        HandleKind::Stage,
        HandleKind::Program,
        HandleKind::Texture,
        HandleKind::Target,
    ];

    fn slot(self) -> usize {
        match self {
            HandleKind::Stage => 0,
            HandleKind::Program => 1,
            HandleKind::Texture => 2,
            HandleKind::Target => 3,
        }
    }
}

/// Point-in-time view of the live handle counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub stages: usize,
    pub programs: usize,
    pub textures: usize,
    pub targets: usize,
}

impl LedgerSnapshot {
    pub fn total(&self) -> usize {
        self.stages + self.programs + self.textures + self.targets
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResourceLedger {
    counts: Arc<[AtomicUsize; 4]>,
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn track(&self, kind: HandleKind) -> LiveHandle {
        self.counts[kind.slot()].fetch_add(1, Ordering::Relaxed);
        LiveHandle {
            counts: Arc::clone(&self.counts),
            kind,
        }
    }

    pub fn live(&self, kind: HandleKind) -> usize {
        self.counts[kind.slot()].load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            stages: self.live(HandleKind::Stage),
            programs: self.live(HandleKind::Program),
            textures: self.live(HandleKind::Texture),
            targets: self.live(HandleKind::Target),
        }
    }
}

/// Ownership token for one live GPU handle.
#[derive(Debug)]
pub(crate) struct LiveHandle {
    counts: Arc<[AtomicUsize; 4]>,
    kind: HandleKind,
}

impl Drop for LiveHandle {
    fn drop(&mut self) {
        self.counts[self.kind.slot()].fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_release_on_drop() {
        let ledger = ResourceLedger::new();
        let stage = ledger.track(HandleKind::Stage);
        let target = ledger.track(HandleKind::Target);
        assert_eq!(ledger.snapshot().total(), 2);

        drop(stage);
        assert_eq!(ledger.live(HandleKind::Stage), 0);
        assert_eq!(ledger.live(HandleKind::Target), 1);

        drop(target);
        assert_eq!(ledger.snapshot(), LedgerSnapshot::default());
    }

    #[test]
    fn clones_share_counts() {
        let ledger = ResourceLedger::new();
        let other = ledger.clone();
        let _texture = other.track(HandleKind::Texture);
        assert_eq!(ledger.live(HandleKind::Texture), 1);
        for kind in HandleKind::ALL {
            if kind != HandleKind::Texture {
                assert_eq!(ledger.live(kind), 0);
            }
        }
    }
}
