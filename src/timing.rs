//! Per-component schedule descriptor: offset, interval, and a sleep count
//! that suppresses upcoming firings. The scheduler is the only mutator of
//! the live "remaining sleep" countdown; see [`crate::scheduler`].

/// `(offset, interval, sleep)`, all virtual-time integers.
///
/// Using `u64` makes "Timing errors (negative offset/interval)" from the
/// error-handling design unrepresentable rather than something to check
/// for at runtime: a negative value simply cannot reach `Timing::new`, so
/// there is nothing here to validate or reject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub offset: u64,
    pub interval: u64,
    pub sleep: u64,
}

impl Timing {
    pub fn new(offset: u64, interval: u64, sleep: u64) -> Self {
        Self {
            offset,
            interval,
            sleep,
        }
    }

    /// A component that fires exactly once, at `offset`, and never again
    /// (interval and sleep of zero would otherwise refire every tick).
    pub fn once(offset: u64) -> Self {
        Self {
            offset,
            interval: u64::MAX - offset,
            sleep: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructs_from_three_fields() {
        let t = Timing::new(0, 1, 2);
        assert_eq!(t.offset, 0);
        assert_eq!(t.interval, 1);
        assert_eq!(t.sleep, 2);
    }
}
