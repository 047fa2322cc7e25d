use crate::models::Grade;

/// Highest score a result can hold.
pub const MAX_SCORE: u8 = 100;

/// Maps a 0-100 average onto the 0.0-4.0 scale.
const CGPA_DIVISOR: f64 = 25.0;

/// Letter grade for a score, checked from the top threshold down.
pub fn grade_for(score: u8) -> Grade {
    match score {
        80.. => Grade::A,
        70..=79 => Grade::B,
        60..=69 => Grade::C,
        50..=59 => Grade::D,
        _ => Grade::F,
    }
}

/// Parses a submitted score field.
///
/// Returns `None` for anything that isn't an integer in `[0, 100]`; callers skip
/// those entries rather than failing the batch.
pub fn parse_score(input: &str) -> Option<u8> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    trimmed
        .parse::<i64>()
        .ok()
        .filter(|score| (0..=i64::from(MAX_SCORE)).contains(score))
        .and_then(|score| u8::try_from(score).ok())
}

/// Arithmetic mean of the scores, or `None` if there are none.
pub fn average_score(scores: &[u8]) -> Option<f64> {
    if scores.is_empty() {
        return None;
    }

    let total: u64 = scores.iter().map(|&s| u64::from(s)).sum();
    Some(total as f64 / scores.len() as f64)
}

/// CGPA for a set of scores, rounded to two decimal places. Empty is 0.0.
pub fn cgpa_for(scores: &[u8]) -> f64 {
    average_score(scores)
        .map(|average| round_to(average / CGPA_DIVISOR, 2))
        .unwrap_or(0.0)
}

/// Rounds half away from zero.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Performance band for a CGPA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Standing {
    Excellent,
    Good,
    Satisfactory,
    NeedsImprovement,
}

impl Standing {
    pub fn for_cgpa(cgpa: f64) -> Self {
        if cgpa >= 3.5 {
            Standing::Excellent
        } else if cgpa >= 3.0 {
            Standing::Good
        } else if cgpa >= 2.5 {
            Standing::Satisfactory
        } else {
            Standing::NeedsImprovement
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Standing::Excellent => "Excellent",
            Standing::Good => "Good",
            Standing::Satisfactory => "Satisfactory",
            Standing::NeedsImprovement => "Needs improvement",
        }
    }

    /// Short advice shown to a student alongside their results.
    pub fn advice(&self) -> &'static str {
        match self {
            Standing::Excellent => {
                "Outstanding performance. Keep up your study habits and consider tutoring peers."
            }
            Standing::Good => {
                "Great performance. Review subjects where you scored below 75% and aim for consistency."
            }
            Standing::Satisfactory => {
                "Good progress. A structured study schedule and work on weaker subjects will help."
            }
            Standing::NeedsImprovement => {
                "Let's improve together. Meet your academic advisor and join a study group."
            }
        }
    }
}
