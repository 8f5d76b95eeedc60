use std::sync::atomic::{AtomicU64, Ordering};

/// Token value meaning "no owner".
pub const UNLOCKED: u64 = 0;

/// Monotonic source of non-zero lock tokens.
///
/// Each logical operation draws one token and uses it for every node lock it
/// takes, so an unlock carrying a token from an earlier, lost race cannot
/// release a lock someone else now holds. Wrapping past `u64::MAX` skips
/// `UNLOCKED` and continues at 1.
#[derive(Debug)]
pub struct VersionTokens {
    next: AtomicU64,
}

impl VersionTokens {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u64) -> Self {
        VersionTokens {
            next: AtomicU64::new(first),
        }
    }

    #[inline]
    pub fn next_token(&self) -> u64 {
        loop {
            let token = self.next.fetch_add(1, Ordering::Relaxed);
            if token != UNLOCKED {
                return token;
            }
        }
    }
}

impl Default for VersionTokens {
    fn default() -> Self {
        Self::new()
    }
}
