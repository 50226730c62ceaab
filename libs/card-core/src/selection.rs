//! Target sources for next-card selection.
//!
//! The picker first looks for the oldest active card whose `remembered` flag
//! equals a drawn target, then for the opposite flag. The draw is a trait so
//! both branches can be forced in tests.

/// Source of the `remembered` value tried first when picking a card.
pub trait TargetSource: Send + Sync {
    fn draw(&self) -> bool;
}

/// Fair coin backed by the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomTarget;

impl TargetSource for RandomTarget {
    fn draw(&self) -> bool {
        rand::random::<bool>()
    }
}

/// Always draws the same value.
#[derive(Debug, Clone, Copy)]
pub struct FixedTarget(pub bool);

impl TargetSource for FixedTarget {
    fn draw(&self) -> bool {
        self.0
    }
}

/// `remembered` buckets in the order they are tried for a drawn target.
pub fn bucket_order(target: bool) -> [bool; 2] {
    [target, !target]
}
