// Strategy: cooldown bookkeeping plus the pure decision function.
pub mod cooldowns;
pub mod evaluator;

pub use cooldowns::{CooldownKind, CooldownRegistry, PendingIntent};
pub use evaluator::{evaluate, Decision, EvalContext};
