//! Scoring and grading shared by the report stages.
//!
//! Scores start at 100 and lose points per finding by severity; the grade
//! is a fixed banding of the score.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::detect::Severity;

/// Points deducted per finding of each severity.
pub mod points {
    pub const CRITICAL: u32 = 20;
    pub const HIGH: u32 = 10;
    pub const MEDIUM: u32 = 5;
    pub const LOW: u32 = 2;
}

/// Lowest score for each grade.
pub mod grades {
    pub const A_MIN: u32 = 90;
    pub const B_MIN: u32 = 75;
    pub const C_MIN: u32 = 60;
    pub const D_MIN: u32 = 45;
}

/// Letter grade of a 0-100 score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn deduction(severity: Severity) -> u32 {
    match severity {
        Severity::Critical => points::CRITICAL,
        Severity::High => points::HIGH,
        Severity::Medium => points::MEDIUM,
        Severity::Low => points::LOW,
    }
}

/// `100 - 20c - 10h - 5m - 2l`, floored at 0.
pub fn severity_score(counts: &BTreeMap<Severity, usize>) -> u32 {
    let lost: u64 = counts
        .iter()
        .map(|(severity, n)| deduction(*severity) as u64 * *n as u64)
        .sum();
    100u64.saturating_sub(lost) as u32
}

pub fn grade(score: u32) -> Grade {
    match score {
        s if s >= grades::A_MIN => Grade::A,
        s if s >= grades::B_MIN => Grade::B,
        s if s >= grades::C_MIN => Grade::C,
        s if s >= grades::D_MIN => Grade::D,
        _ => Grade::F,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(c: usize, h: usize, m: usize, l: usize) -> BTreeMap<Severity, usize> {
        [
            (Severity::Critical, c),
            (Severity::High, h),
            (Severity::Medium, m),
            (Severity::Low, l),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_severity_score() {
        assert_eq!(severity_score(&counts(0, 0, 0, 0)), 100);
        assert_eq!(severity_score(&counts(1, 1, 1, 1)), 63);
        assert_eq!(severity_score(&counts(0, 2, 0, 3)), 74);
        assert_eq!(severity_score(&counts(6, 0, 0, 0)), 0);
        assert_eq!(severity_score(&BTreeMap::new()), 100);
    }

    #[test]
    fn test_grade_boundaries() {
        assert_eq!(grade(100), Grade::A);
        assert_eq!(grade(90), Grade::A);
        assert_eq!(grade(89), Grade::B);
        assert_eq!(grade(75), Grade::B);
        assert_eq!(grade(60), Grade::C);
        assert_eq!(grade(45), Grade::D);
        assert_eq!(grade(44), Grade::F);
        assert_eq!(grade(0).to_string(), "F");
    }
}
