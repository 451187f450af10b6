/// Result of grading a session against the question bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Score {
    correct: u32,
    total: u32,
    percentage: u32,
}

/// Coarse grade shown next to the percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBand {
    Excellent,
    Good,
    NeedsPractice,
}

impl Score {
    /// Build a score, rounding the percentage half up.
    ///
    /// `percentage = round(100 * correct / total)` computed on integers as
    /// `(200 * correct + total) / (2 * total)`, so an exact `.5` rounds up
    /// (12.5% becomes 13%). For non-negative values this matches rounding half
    /// away from zero. An empty bank scores 0%.
    #[must_use]
    pub fn new(correct: u32, total: u32) -> Self {
        let correct = correct.min(total);
        let percentage = if total == 0 {
            0
        } else {
            let numerator = 200 * u64::from(correct) + u64::from(total);
            let denominator = 2 * u64::from(total);
            u32::try_from(numerator / denominator).unwrap_or(100)
        };
        Self {
            correct,
            total,
            percentage,
        }
    }

    #[must_use]
    pub fn correct(&self) -> u32 {
        self.correct
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.total
    }

    #[must_use]
    pub fn percentage(&self) -> u32 {
        self.percentage
    }

    #[must_use]
    pub fn band(&self) -> ScoreBand {
        match self.percentage {
            80.. => ScoreBand::Excellent,
            60..=79 => ScoreBand::Good,
            _ => ScoreBand::NeedsPractice,
        }
    }
}
