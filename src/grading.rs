use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Grade returned when no configured band covers a mark.
pub const WORST_GRADE: &str = "F9";
pub const WORST_COMMENT: &str = "Fail";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeBand {
    pub min_mark: f64,
    pub max_mark: f64,
    pub grade: String,
    #[serde(default)]
    pub comment: String,
}

impl GradeBand {
    pub fn new(min_mark: f64, max_mark: f64, grade: &str, comment: &str) -> Self {
        Self {
            min_mark,
            max_mark,
            grade: grade.to_string(),
            comment: comment.to_string(),
        }
    }

    pub fn covers(&self, mark: f64) -> bool {
        self.min_mark <= mark && mark <= self.max_mark
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeLookup {
    pub grade: String,
    pub comment: String,
}

impl GradeLookup {
    fn worst() -> Self {
        Self {
            grade: WORST_GRADE.to_string(),
            comment: WORST_COMMENT.to_string(),
        }
    }
}

/// Nine-band scale used when neither the request nor the workspace supplies one.
pub fn default_bands() -> Vec<GradeBand> {
    vec![
        GradeBand::new(80.0, 100.0, "D1", "Excellent"),
        GradeBand::new(75.0, 79.99, "D2", "Very good"),
        GradeBand::new(70.0, 74.99, "C3", "Good"),
        GradeBand::new(65.0, 69.99, "C4", "Fairly good"),
        GradeBand::new(60.0, 64.99, "C5", "Fair"),
        GradeBand::new(50.0, 59.99, "C6", "Average"),
        GradeBand::new(45.0, 49.99, "P7", "Below average"),
        GradeBand::new(35.0, 44.99, "P8", "Weak"),
        GradeBand::new(0.0, 34.99, "F9", "Fail"),
    ]
}

/// First band (in supplied order) whose inclusive range covers `mark`.
/// Gaps, out-of-range marks and an empty scale all resolve to the worst grade.
pub fn grade_for(mark: f64, bands: &[GradeBand]) -> GradeLookup {
    bands
        .iter()
        .find(|b| b.covers(mark))
        .map(|b| GradeLookup {
            grade: b.grade.clone(),
            comment: b.comment.clone(),
        })
        .unwrap_or_else(|| {
            tracing::debug!(mark, bands = bands.len(), "no grade band covers mark");
            GradeLookup::worst()
        })
}

/// Comment attached to a grade code, used when a grade was entered directly
/// rather than resolved from a mark.
pub fn comment_for_grade(grade: &str, bands: &[GradeBand]) -> Option<String> {
    let code = grade.trim();
    if code.is_empty() {
        return None;
    }
    bands
        .iter()
        .find(|b| b.grade.trim().eq_ignore_ascii_case(code))
        .map(|b| b.comment.clone())
        .or_else(|| code.eq_ignore_ascii_case(WORST_GRADE).then(|| WORST_COMMENT.to_string()))
}

/// Bands ordered best-first for the printed legend.
pub fn legend(bands: &[GradeBand]) -> Vec<GradeBand> {
    let mut out = bands.to_vec();
    out.sort_by(|a, b| {
        b.max_mark
            .partial_cmp(&a.max_mark)
            .unwrap_or(Ordering::Equal)
    });
    out
}

/// Configuration-time checks for a grading scale. Resolution never calls this;
/// a bad scale degrades to the worst grade instead of failing a report.
pub fn validate_bands(bands: &[GradeBand]) -> Result<(), String> {
    for (i, b) in bands.iter().enumerate() {
        if b.grade.trim().is_empty() {
            return Err(format!("bands[{}].grade must not be empty", i));
        }
        if !b.min_mark.is_finite() || !b.max_mark.is_finite() {
            return Err(format!("bands[{}] marks must be finite numbers", i));
        }
        if b.min_mark > b.max_mark {
            return Err(format!("bands[{}].minMark must be <= maxMark", i));
        }
        if b.min_mark < 0.0 || b.max_mark > 100.0 {
            return Err(format!("bands[{}] must lie within 0..=100", i));
        }
    }
    let mut sorted: Vec<&GradeBand> = bands.iter().collect();
    sorted.sort_by(|a, b| {
        a.min_mark
            .partial_cmp(&b.min_mark)
            .unwrap_or(Ordering::Equal)
    });
    for pair in sorted.windows(2) {
        if pair[1].min_mark <= pair[0].max_mark {
            return Err(format!(
                "bands {} and {} overlap",
                pair[0].grade, pair[1].grade
            ));
        }
    }
    Ok(())
}
