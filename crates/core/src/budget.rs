// Per-turn tool call budget

/// Tool calls allowed per conversational turn unless configured otherwise
pub const DEFAULT_MAX_TOOL_CALLS_PER_TURN: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("tool call budget of {limit} calls for this turn is exhausted")]
pub struct BudgetExhausted {
    pub limit: u32,
}

/// Counts tool calls made during the current turn.
///
/// The counter starts at zero at every turn start and never exceeds `limit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCallBudget {
    limit: u32,
    used: u32,
}

impl SessionCallBudget {
    pub fn new(limit: u32) -> Self {
        Self { limit, used: 0 }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn remaining(&self) -> u32 {
        self.limit - self.used
    }

    pub fn is_exhausted(&self) -> bool {
        self.used >= self.limit
    }

    /// Take one unit of budget, or fail without changing the counter.
    pub fn try_consume(&mut self) -> Result<(), BudgetExhausted> {
        if self.is_exhausted() {
            return Err(BudgetExhausted { limit: self.limit });
        }
        self.used += 1;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.used = 0;
    }
}

impl Default for SessionCallBudget {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TOOL_CALLS_PER_TURN)
    }
}
