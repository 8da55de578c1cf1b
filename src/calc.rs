use serde::Serialize;

use crate::grading::{comment_for_grade, grade_for, GradeBand};
use crate::model::{IdentifiedStudent, Subject, SubjectCategory};
use crate::reconcile::{MarkRecord, ResolvedMarks};

#[derive(Debug, Clone, Serialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct CalcError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl CalcError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreState {
    Unset,
    Zero,
    Scored(f64),
}

impl ScoreState {
    pub fn from_raw(raw: Option<f64>) -> Self {
        match raw {
            None => ScoreState::Unset,
            Some(v) if v == 0.0 || v.is_nan() => ScoreState::Zero,
            Some(v) => ScoreState::Scored(v),
        }
    }

    pub fn value(self) -> f64 {
        match self {
            ScoreState::Scored(v) => v,
            ScoreState::Unset | ScoreState::Zero => 0.0,
        }
    }

    /// Zero and unset both print blank.
    pub fn display(self) -> Option<f64> {
        match self {
            ScoreState::Scored(v) => Some(v),
            ScoreState::Unset | ScoreState::Zero => None,
        }
    }

    fn grade(self, bands: &[GradeBand]) -> String {
        match self {
            ScoreState::Scored(v) if v > 0.0 => grade_for(v, bands).grade,
            _ => String::new(),
        }
    }
}

/// Derived per-subject view of one student's marks. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectComputedRow {
    pub subject_id: String,
    pub subject_name: String,
    pub homework: Option<f64>,
    pub bot: Option<f64>,
    pub bot_grade: String,
    pub midterm: Option<f64>,
    pub midterm_grade: String,
    pub eot: Option<f64>,
    pub eot_grade: String,
    pub total: Option<f64>,
    pub grade: String,
    pub teacher_initials: String,
    pub remarks: String,
    pub category: SubjectCategory,
}

impl SubjectComputedRow {
    fn blank(subject: &Subject) -> Self {
        Self {
            subject_id: subject.id.clone(),
            subject_name: subject.name.clone(),
            homework: None,
            bot: None,
            bot_grade: String::new(),
            midterm: None,
            midterm_grade: String::new(),
            eot: None,
            eot_grade: String::new(),
            total: None,
            grade: String::new(),
            teacher_initials: String::new(),
            remarks: String::new(),
            category: subject.category,
        }
    }
}

/// Uppercased first letter of every whitespace-separated token.
pub fn initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|token| token.chars().next())
        .flat_map(char::to_uppercase)
        .collect()
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|v| !v.is_empty())
}

fn teacher_initials(assigned_teacher: Option<&str>, mark: &MarkRecord) -> String {
    [
        assigned_teacher,
        mark.created_by.as_deref(),
        mark.teacher.as_deref(),
    ]
    .into_iter()
    .map(|name| initials(name.unwrap_or("")))
    .find(|i| !i.is_empty())
    .unwrap_or_default()
}

pub fn aggregate(
    subject: &Subject,
    mark: Option<&MarkRecord>,
    bands: &[GradeBand],
    assigned_teacher: Option<&str>,
) -> SubjectComputedRow {
    let Some(mark) = mark else {
        return SubjectComputedRow::blank(subject);
    };

    let homework = ScoreState::from_raw(mark.homework);
    let bot = ScoreState::from_raw(mark.bot);
    let midterm = ScoreState::from_raw(mark.midterm);
    let eot = ScoreState::from_raw(mark.eot);

    let total = match mark.total {
        Some(t) => ScoreState::from_raw(Some(t)),
        None => ScoreState::from_raw(Some(
            homework.value() + bot.value() + midterm.value() + eot.value(),
        )),
    };

    let bot_grade = bot.grade(bands);
    let midterm_grade = midterm.grade(bands);
    let eot_grade = eot.grade(bands);

    let grade = match non_empty(mark.grade.as_deref()) {
        Some(g) => g.to_string(),
        None => total.grade(bands),
    };

    let remarks = if let Some(r) = non_empty(mark.remarks.as_deref()) {
        r.to_string()
    } else if !eot_grade.is_empty() {
        grade_for(eot.value(), bands).comment
    } else if total.value() > 0.0 {
        comment_for_grade(&grade, bands).unwrap_or_else(|| grade_for(total.value(), bands).comment)
    } else {
        String::new()
    };

    SubjectComputedRow {
        subject_id: subject.id.clone(),
        subject_name: subject.name.clone(),
        homework: homework.display(),
        bot: bot.display(),
        bot_grade,
        midterm: midterm.display(),
        midterm_grade,
        eot: eot.display(),
        eot_grade,
        total: total.display(),
        grade,
        teacher_initials: teacher_initials(assigned_teacher, mark),
        remarks,
        category: subject.category,
    }
}

/// One row per class subject, in class order, whether assessed or not.
pub fn aggregate_student(
    student: &IdentifiedStudent<'_>,
    marks: &ResolvedMarks,
    bands: &[GradeBand],
) -> Vec<SubjectComputedRow> {
    student
        .subjects
        .iter()
        .map(|subject| {
            aggregate(
                subject,
                marks.for_subject(&subject.id),
                bands,
                student.student.assigned_teacher(&subject.id),
            )
        })
        .collect()
}
