//! Per-turn cancellation coordination.
//!
//! One token per logical user turn, shared across every recursive tool
//! step of that turn. The coordinator is the only component that requires
//! guaranteed cleanup on every exit path; [`ReleaseGuard`] provides it.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Identity of one logical user turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TurnId(Uuid);

impl TurnId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TurnId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Registry of live cancellation tokens, keyed by turn id.
///
/// Supports concurrent attach/signal/release from one producer (a
/// user-triggered cancel) and one consumer (the executing pipeline).
#[derive(Debug, Default)]
pub struct CancellationCoordinator {
    turns: Mutex<HashMap<TurnId, CancellationToken>>,
}

impl CancellationCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the turn's token, minting one on first call. Idempotent:
    /// repeated calls for the same active turn return the same token.
    pub fn attach(&self, turn: TurnId) -> CancellationToken {
        self.turns
            .lock()
            .expect("coordinator lock poisoned")
            .entry(turn)
            .or_default()
            .clone()
    }

    /// Signal the turn's token. A no-op for unknown or already released
    /// turns, including signals arriving after the turn finished.
    pub fn signal(&self, turn: TurnId) {
        let token = self
            .turns
            .lock()
            .expect("coordinator lock poisoned")
            .get(&turn)
            .cloned();
        if let Some(token) = token {
            token.cancel();
        }
    }

    /// Drop the turn's registry entry. Safe to call more than once; only
    /// the first release clears the turn.
    pub fn release(&self, turn: TurnId) {
        self.turns
            .lock()
            .expect("coordinator lock poisoned")
            .remove(&turn);
    }

    /// Whether the turn currently holds a live token.
    pub fn is_active(&self, turn: TurnId) -> bool {
        self.turns
            .lock()
            .expect("coordinator lock poisoned")
            .contains_key(&turn)
    }
}

/// Releases a turn on drop, covering success, error and cancellation
/// paths alike.
pub struct ReleaseGuard {
    coordinator: Arc<CancellationCoordinator>,
    turn: TurnId,
}

impl ReleaseGuard {
    pub fn new(coordinator: Arc<CancellationCoordinator>, turn: TurnId) -> Self {
        Self { coordinator, turn }
    }
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.coordinator.release(self.turn);
    }
}

/// Lets a UI stop generation for one turn without pipeline knowledge.
#[derive(Clone)]
pub struct StopHandle {
    coordinator: Arc<CancellationCoordinator>,
    turn: TurnId,
}

impl StopHandle {
    pub fn new(coordinator: Arc<CancellationCoordinator>, turn: TurnId) -> Self {
        Self { coordinator, turn }
    }

    pub fn turn_id(&self) -> TurnId {
        self.turn
    }

    /// Signal the turn's token.
    pub fn stop(&self) {
        self.coordinator.signal(self.turn);
    }
}
