// SPDX-License-Identifier: GPL-3.0-only

//! Liveness tokens
//!
//! A token is owned by whoever starts work (the session itself, or one loop
//! instance). Once revoked it never becomes alive again; restarting means
//! minting a new token.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Shared "should my results still be applied" flag
#[derive(Debug, Clone)]
pub struct Liveness {
    alive: Arc<AtomicBool>,
    id: u64,
}

impl Liveness {
    pub fn new() -> Self {
        Self {
            alive: Arc::new(AtomicBool::new(true)),
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Returns true if this call did the revoking
    pub fn revoke(&self) -> bool {
        self.alive.swap(false, Ordering::AcqRel)
    }

    /// Unique per token, used as the in-flight owner
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}
