use serde::Serialize;

use crate::calc::SubjectComputedRow;

pub const WORST_POINTS: u8 = 9;

const POINT_TABLE: [(&str, u8); 9] = [
    ("D1", 1),
    ("D2", 2),
    ("C3", 3),
    ("C4", 4),
    ("C5", 5),
    ("C6", 6),
    ("P7", 7),
    ("P8", 8),
    ("F9", 9),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Division {
    #[serde(rename = "DIVISION I")]
    One,
    #[serde(rename = "DIVISION II")]
    Two,
    #[serde(rename = "DIVISION III")]
    Three,
    #[serde(rename = "DIVISION IV")]
    Four,
    #[serde(rename = "FAIL")]
    Fail,
}

impl Division {
    pub const ALL: [Division; 5] = [
        Division::One,
        Division::Two,
        Division::Three,
        Division::Four,
        Division::Fail,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Division::One => "DIVISION I",
            Division::Two => "DIVISION II",
            Division::Three => "DIVISION III",
            Division::Four => "DIVISION IV",
            Division::Fail => "FAIL",
        }
    }

    /// Upper bounds are inclusive; anything above 8.5 fails.
    pub fn from_average(average: f64) -> Self {
        if average <= 2.5 {
            Division::One
        } else if average <= 4.5 {
            Division::Two
        } else if average <= 6.5 {
            Division::Three
        } else if average <= 8.5 {
            Division::Four
        } else {
            Division::Fail
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DivisionResult {
    pub average_aggregate_points: f64,
    pub division: Division,
}

/// Aggregate points for a grade code; unknown or blank grades count as failing.
pub fn points_for_grade(grade: &str) -> u8 {
    let code = grade.trim();
    POINT_TABLE
        .iter()
        .find(|(g, _)| g.eq_ignore_ascii_case(code))
        .map(|(_, p)| *p)
        .unwrap_or(WORST_POINTS)
}

pub fn classify(rows: &[SubjectComputedRow]) -> DivisionResult {
    let points: Vec<u8> = rows
        .iter()
        .filter(|r| r.category.is_general())
        .map(|r| points_for_grade(&r.eot_grade))
        .collect();
    let average_aggregate_points = if points.is_empty() {
        f64::from(WORST_POINTS)
    } else {
        points.iter().map(|p| f64::from(*p)).sum::<f64>() / points.len() as f64
    };
    DivisionResult {
        average_aggregate_points,
        division: Division::from_average(average_aggregate_points),
    }
}
