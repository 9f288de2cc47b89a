//! Explicit two-phase commit for optimistic updates.

/// A provisional value awaiting confirmation.
///
/// Models the optimistic-update pattern as a value transition instead of ad
/// hoc mutation: the caller produces a provisional value, attempts the
/// side effect that would justify it, then either [`confirm`](Self::confirm)s
/// (keeping the provisional value) or [`discard`](Self::discard)s (reverting
/// to the prior one). Consuming methods make "forgot to decide" a type error.
#[derive(Debug)]
pub struct Provisional<T> {
    prior: T,
    provisional: T,
}

impl<T> Provisional<T> {
    /// Stage a provisional value over the prior state.
    pub fn new(prior: T, provisional: T) -> Self {
        Self { prior, provisional }
    }

    /// The staged value, for use while the outcome is still undecided.
    pub fn provisional(&self) -> &T {
        &self.provisional
    }

    /// The state the caller reverts to on discard.
    pub fn prior(&self) -> &T {
        &self.prior
    }

    /// The side effect succeeded; the provisional value becomes committed.
    pub fn confirm(self) -> T {
        self.provisional
    }

    /// The side effect failed; revert to the prior state.
    pub fn discard(self) -> T {
        self.prior
    }
}
