//! The `Result` classification and its severity ordering.

/// A display color: either a single foreground name, or (for FATAL) a
/// foreground/background pair — grounded on the original's
/// `('white', 'red_1')` encoding for internal-error severity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Color {
    Single(&'static str),
    Pair(&'static str, &'static str),
}

/// Classification of a [`TestCase`](super::TestCase)'s outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestResult {
    Skip,
    Pass,
    Error,
    Exception,
    Fatal,
}

impl TestResult {
    /// 0 or 1, used for aggregate exit-code classification (§6).
    pub fn exitcode(&self) -> u8 {
        match self {
            TestResult::Skip | TestResult::Pass => 0,
            TestResult::Error | TestResult::Exception | TestResult::Fatal => 1,
        }
    }

    pub fn display(&self) -> &'static str {
        match self {
            TestResult::Skip => "SKIP",
            TestResult::Pass => "OK",
            TestResult::Error => "ERROR",
            TestResult::Exception => "EXCEPTION",
            TestResult::Fatal => "FATAL",
        }
    }

    /// Inverse of [`display`](Self::display). Used by the QueueManager to
    /// recover a Result from a reaped third-party results file.
    pub fn from_display(s: &str) -> Option<Self> {
        match s {
            "SKIP" => Some(TestResult::Skip),
            "OK" => Some(TestResult::Pass),
            "ERROR" => Some(TestResult::Error),
            "EXCEPTION" => Some(TestResult::Exception),
            "FATAL" => Some(TestResult::Fatal),
            _ => None,
        }
    }

    pub fn color(&self) -> Color {
        match self {
            TestResult::Skip => Color::Single("cyan"),
            TestResult::Pass => Color::Single("green"),
            TestResult::Error => Color::Single("red"),
            TestResult::Exception => Color::Single("magenta"),
            TestResult::Fatal => Color::Pair("white", "red"),
        }
    }

    /// Severity used when aggregating a Runner's result with its Differs'
    /// results (§4.4): PASS < SKIP < ERROR ≈ EXCEPTION < FATAL. This is a
    /// deliberately different order from the enum's own variant order,
    /// which instead groups "non-failing" before "failing" for exitcode
    /// purposes; aggregation additionally ranks a SKIP worse than a PASS
    /// since a SKIP anywhere in the chain means something didn't run.
    fn aggregation_rank(&self) -> u8 {
        match self {
            TestResult::Pass => 0,
            TestResult::Skip => 1,
            // ERROR and EXCEPTION are treated as equal in aggregation per
            // the open question in Design Notes; EXCEPTION is preferred
            // when reporting a tie since it is strictly more informative.
            TestResult::Error => 2,
            TestResult::Exception => 2,
            TestResult::Fatal => 3,
        }
    }

    /// The worse of `self` and `other`, by aggregation rank. On an
    /// ERROR/EXCEPTION tie, EXCEPTION wins (see `aggregation_rank`).
    pub fn worse_of(self, other: TestResult) -> TestResult {
        match self.aggregation_rank().cmp(&other.aggregation_rank()) {
            std::cmp::Ordering::Greater => self,
            std::cmp::Ordering::Less => other,
            std::cmp::Ordering::Equal => {
                if self == TestResult::Exception || other == TestResult::Exception {
                    TestResult::Exception
                } else {
                    self
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exitcode_bit_matches_spec() {
        assert_eq!(TestResult::Skip.exitcode(), 0);
        assert_eq!(TestResult::Pass.exitcode(), 0);
        assert_eq!(TestResult::Error.exitcode(), 1);
        assert_eq!(TestResult::Exception.exitcode(), 1);
        assert_eq!(TestResult::Fatal.exitcode(), 1);
    }

    #[test]
    fn fatal_uses_a_color_pair() {
        assert_eq!(TestResult::Fatal.color(), Color::Pair("white", "red"));
        assert_eq!(TestResult::Pass.color(), Color::Single("green"));
    }

    #[test]
    fn worse_of_orders_pass_below_skip_below_error() {
        assert_eq!(TestResult::Pass.worse_of(TestResult::Skip), TestResult::Skip);
        assert_eq!(TestResult::Skip.worse_of(TestResult::Error), TestResult::Error);
        assert_eq!(TestResult::Error.worse_of(TestResult::Fatal), TestResult::Fatal);
    }

    #[test]
    fn error_exception_tie_prefers_exception() {
        assert_eq!(TestResult::Error.worse_of(TestResult::Exception), TestResult::Exception);
        assert_eq!(TestResult::Exception.worse_of(TestResult::Error), TestResult::Exception);
    }
}
