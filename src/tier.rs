//! Percentile to letter-grade classification with small-sample correction.

use std::fmt;

use serde::Serialize;

/// Letter grades, ordered worst to best so that `Ord` matches rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum TierGrade {
    F,
    D,
    C,
    B,
    A,
    S,
}

impl TierGrade {
    pub fn as_str(self) -> &'static str {
        match self {
            TierGrade::S => "S",
            TierGrade::A => "A",
            TierGrade::B => "B",
            TierGrade::C => "C",
            TierGrade::D => "D",
            TierGrade::F => "F",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            TierGrade::S => "#ffd700",
            TierGrade::A => "#10b981",
            TierGrade::B => "#3b82f6",
            TierGrade::C => "#8b5cf6",
            TierGrade::D => "#f59e0b",
            TierGrade::F => "#ef4444",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TierGrade::S => "Exceptional",
            TierGrade::A => "Excellent",
            TierGrade::B => "Good",
            TierGrade::C => "Average",
            TierGrade::D => "Below Average",
            TierGrade::F => "Poor",
        }
    }
}

impl fmt::Display for TierGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Tier {
    pub tier: TierGrade,
    pub color: &'static str,
    pub label: &'static str,
}

impl From<TierGrade> for Tier {
    fn from(grade: TierGrade) -> Self {
        Self {
            tier: grade,
            color: grade.color(),
            label: grade.label(),
        }
    }
}

/// Grades a percentile (0..=100) within a cohort of `sample_size` members.
///
/// Cohorts of two or fewer can only be B or C; S and F need at least six members.
/// A `NaN` percentile lands in the lowest grade the sample size allows.
pub fn classify_tier(percentile: f64, sample_size: usize) -> Tier {
    let p = percentile;
    let grade = match sample_size {
        0..=2 => {
            if p >= 50.0 {
                TierGrade::B
            } else {
                TierGrade::C
            }
        }
        3..=5 => {
            if p >= 80.0 {
                TierGrade::A
            } else if p >= 60.0 {
                TierGrade::B
            } else if p >= 40.0 {
                TierGrade::C
            } else {
                TierGrade::D
            }
        }
        6..=10 => {
            if p >= 85.0 {
                TierGrade::S
            } else if p >= 70.0 {
                TierGrade::A
            } else if p >= 45.0 {
                TierGrade::B
            } else if p >= 30.0 {
                TierGrade::C
            } else if p >= 15.0 {
                TierGrade::D
            } else {
                TierGrade::F
            }
        }
        _ => {
            if p >= 90.0 {
                TierGrade::S
            } else if p >= 75.0 {
                TierGrade::A
            } else if p >= 50.0 {
                TierGrade::B
            } else if p >= 25.0 {
                TierGrade::C
            } else if p >= 10.0 {
                TierGrade::D
            } else {
                TierGrade::F
            }
        }
    };
    Tier::from(grade)
}
