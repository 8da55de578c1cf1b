use chrono::NaiveDate;
use serde::Serialize;

use crate::calc::SubjectComputedRow;
use crate::division::{points_for_grade, Division, DivisionResult};
use crate::grading::{legend, GradeBand};
use crate::model::IdentifiedStudent;

/// Page separator in the text rendering.
pub const PAGE_BREAK: char = '\u{000C}';

const RULE_WIDTH: usize = 96;

#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub school_name: String,
    pub show_legend: bool,
    pub show_generated_at: bool,
    pub no_marks_note: String,
    pub generated_on: NaiveDate,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalsRow {
    pub homework: f64,
    pub bot: f64,
    pub midterm: f64,
    pub eot: f64,
    pub bot_points: u32,
    pub midterm_points: u32,
    pub eot_points: u32,
}

fn stage_points(grade: &str) -> u32 {
    if grade.is_empty() {
        0
    } else {
        u32::from(points_for_grade(grade))
    }
}

/// Sums over general subjects only; subsidiary rows are printed but not counted.
pub fn totals(rows: &[SubjectComputedRow]) -> TotalsRow {
    rows.iter()
        .filter(|r| r.category.is_general())
        .fold(TotalsRow::default(), |mut t, r| {
            t.homework += r.homework.unwrap_or(0.0);
            t.bot += r.bot.unwrap_or(0.0);
            t.midterm += r.midterm.unwrap_or(0.0);
            t.eot += r.eot.unwrap_or(0.0);
            t.bot_points += stage_points(&r.bot_grade);
            t.midterm_points += stage_points(&r.midterm_grade);
            t.eot_points += stage_points(&r.eot_grade);
            t
        })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDocument {
    pub school_name: String,
    pub student_id: String,
    pub student_name: String,
    pub class_name: String,
    pub term: Option<String>,
    pub academic_year: Option<String>,
    pub photo: Option<String>,
    pub rows: Vec<SubjectComputedRow>,
    pub totals: TotalsRow,
    pub division: DivisionResult,
    pub legend: Vec<GradeBand>,
    pub note: Option<String>,
    pub generated_on: Option<NaiveDate>,
}

pub fn render_student(
    student: &IdentifiedStudent<'_>,
    rows: Vec<SubjectComputedRow>,
    division: DivisionResult,
    bands: &[GradeBand],
    marks_found: bool,
    options: &ReportOptions,
) -> ReportDocument {
    let s = student.student;
    let period_label = |p: &Option<crate::model::PeriodRef>| {
        p.as_ref()
            .map(|p| p.name.clone().unwrap_or_else(|| p.id.clone()))
    };
    ReportDocument {
        school_name: options.school_name.clone(),
        student_id: student.id.to_string(),
        student_name: s.name.clone(),
        class_name: s.class_name().to_string(),
        term: period_label(&s.term),
        academic_year: period_label(&s.academic_year),
        photo: s.photo.clone(),
        totals: totals(&rows),
        rows,
        division,
        legend: if options.show_legend {
            legend(bands)
        } else {
            Vec::new()
        },
        note: (!marks_found).then(|| options.no_marks_note.clone()),
        generated_on: options.show_generated_at.then_some(options.generated_on),
    }
}

fn fmt_num(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{:.0}", v)
    } else {
        let s = format!("{:.2}", v);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(fmt_num).unwrap_or_default()
}

fn clip(s: &str, width: usize) -> String {
    s.chars().take(width).collect()
}

impl ReportDocument {
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let rule = "-".repeat(RULE_WIDTH);
        if !self.school_name.is_empty() {
            out.push_str(&self.school_name.to_uppercase());
            out.push('\n');
        }
        out.push_str("STUDENT REPORT CARD\n");
        out.push_str(&format!(
            "Name: {}    Student ID: {}\n",
            self.student_name, self.student_id
        ));
        out.push_str(&format!("Class: {}", self.class_name));
        if let Some(term) = &self.term {
            out.push_str(&format!("    Term: {}", term));
        }
        if let Some(year) = &self.academic_year {
            out.push_str(&format!("    Year: {}", year));
        }
        out.push('\n');
        if let Some(photo) = &self.photo {
            out.push_str(&format!("Photo: {}\n", photo));
        }
        out.push_str(&rule);
        out.push('\n');
        out.push_str(&format!(
            "{:<18} {:>5} {:>5} {:<3} {:>5} {:<3} {:>5} {:<3} {:>6} {:<3} {:<5} {}\n",
            "SUBJECT", "HW", "BOT", "GR", "MID", "GR", "EOT", "GR", "TOTAL", "GR", "INIT", "REMARKS"
        ));
        for r in &self.rows {
            let name = match r.category {
                crate::model::SubjectCategory::General => clip(&r.subject_name, 18),
                crate::model::SubjectCategory::Subsidiary => {
                    clip(&format!("{} (sub)", r.subject_name), 18)
                }
            };
            out.push_str(&format!(
                "{:<18} {:>5} {:>5} {:<3} {:>5} {:<3} {:>5} {:<3} {:>6} {:<3} {:<5} {}\n",
                name,
                fmt_opt(r.homework),
                fmt_opt(r.bot),
                r.bot_grade,
                fmt_opt(r.midterm),
                r.midterm_grade,
                fmt_opt(r.eot),
                r.eot_grade,
                fmt_opt(r.total),
                r.grade,
                r.teacher_initials,
                r.remarks
            ));
        }
        out.push_str(&rule);
        out.push('\n');
        let t = &self.totals;
        out.push_str(&format!(
            "{:<18} {:>5} {:>5} {:<3} {:>5} {:<3} {:>5} {:<3}\n",
            "TOTAL",
            fmt_num(t.homework),
            fmt_num(t.bot),
            t.bot_points,
            fmt_num(t.midterm),
            t.midterm_points,
            fmt_num(t.eot),
            t.eot_points
        ));
        out.push_str(&format!(
            "Average aggregate: {:.2}    {}\n",
            self.division.average_aggregate_points,
            self.division.division.as_str()
        ));
        if let Some(note) = &self.note {
            out.push_str(&format!("Note: {}\n", note));
        }
        if !self.legend.is_empty() {
            out.push_str("\nGRADING SCALE\n");
            for b in &self.legend {
                out.push_str(&format!(
                    "  {:<4} {:>6} - {:<6} {}\n",
                    b.grade,
                    fmt_num(b.min_mark),
                    fmt_num(b.max_mark),
                    b.comment
                ));
            }
        }
        if let Some(d) = self.generated_on {
            out.push_str(&format!("\nGenerated: {}\n", d.format("%Y-%m-%d")));
        }
        out
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DivisionCount {
    pub division: Division,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportBundle {
    pub school_name: String,
    pub class_name: String,
    pub student_count: usize,
    pub generated_on: NaiveDate,
    pub division_counts: Vec<DivisionCount>,
    pub documents: Vec<ReportDocument>,
}

pub fn render_class(
    class_name: &str,
    documents: Vec<ReportDocument>,
    options: &ReportOptions,
) -> ReportBundle {
    let division_counts = Division::ALL
        .iter()
        .map(|d| DivisionCount {
            division: *d,
            count: documents
                .iter()
                .filter(|doc| doc.division.division == *d)
                .count(),
        })
        .collect();
    ReportBundle {
        school_name: options.school_name.clone(),
        class_name: class_name.to_string(),
        student_count: documents.len(),
        generated_on: options.generated_on,
        division_counts,
        documents,
    }
}

impl ReportBundle {
    fn preface(&self) -> String {
        let mut out = String::new();
        if !self.school_name.is_empty() {
            out.push_str(&self.school_name.to_uppercase());
            out.push('\n');
        }
        out.push_str("CLASS REPORT CARDS\n");
        out.push_str(&format!("Class: {}\n", self.class_name));
        out.push_str(&format!("Students: {}\n", self.student_count));
        out.push_str(&format!(
            "Generated: {}\n",
            self.generated_on.format("%Y-%m-%d")
        ));
        out.push_str("\nDIVISION SUMMARY\n");
        for c in &self.division_counts {
            out.push_str(&format!("  {:<13} {}\n", c.division.as_str(), c.count));
        }
        out
    }

    /// Preface page followed by one page per student.
    pub fn to_text(&self) -> String {
        let mut pages = vec![self.preface()];
        pages.extend(self.documents.iter().map(ReportDocument::to_text));
        pages.join(&PAGE_BREAK.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calc::aggregate_student;
    use crate::division::classify;
    use crate::grading::default_bands;
    use crate::model::{identify, ClassInfo, PeriodRef, Student, Subject, SubjectCategory};
    use crate::reconcile::{resolve_marks, MarkRecord, MarkSources};

    fn options() -> ReportOptions {
        ReportOptions {
            school_name: "Hillside Primary".into(),
            show_legend: true,
            show_generated_at: true,
            no_marks_note: "No marks recorded".into(),
            generated_on: NaiveDate::from_ymd_opt(2024, 8, 2).expect("date"),
        }
    }

    fn student(id: &str) -> Student {
        Student {
            id: Some(id.into()),
            name: format!("Student {}", id),
            class: Some(ClassInfo {
                name: "P7 East".into(),
                subjects: Some(vec![
                    Subject {
                        id: "math".into(),
                        name: "Mathematics".into(),
                        category: SubjectCategory::General,
                    },
                    Subject {
                        id: "art".into(),
                        name: "Art".into(),
                        category: SubjectCategory::Subsidiary,
                    },
                ]),
                subject_teachers: Vec::new(),
            }),
            term: Some(PeriodRef {
                id: "t2".into(),
                name: Some("Term II".into()),
            }),
            ..Student::default()
        }
    }

    fn document(student: &Student, marks: Vec<MarkRecord>) -> ReportDocument {
        let bands = default_bands();
        let identified = identify(student).expect("identified");
        let sources = MarkSources {
            direct: marks,
            ..MarkSources::default()
        };
        let resolved = resolve_marks(identified.id, student, &sources);
        let rows = aggregate_student(&identified, &resolved, &bands);
        let division = classify(&rows);
        render_student(
            &identified,
            rows,
            division,
            &bands,
            !resolved.records.is_empty(),
            &options(),
        )
    }

    fn scored(subject: &str, bot: f64, mid: f64, eot: f64) -> MarkRecord {
        MarkRecord {
            subject_id: subject.into(),
            term_id: Some("t2".into()),
            homework: Some(5.0),
            bot: Some(bot),
            midterm: Some(mid),
            eot: Some(eot),
            ..MarkRecord::default()
        }
    }

    #[test]
    fn totals_exclude_subsidiary_subjects() {
        let s = student("s1");
        let doc = document(&s, vec![scored("math", 82.0, 76.0, 71.0), scored("art", 90.0, 90.0, 90.0)]);
        assert_eq!(doc.rows.len(), 2);
        assert_eq!(doc.rows[1].eot_grade, "D1");
        assert_eq!(doc.totals.homework, 5.0);
        assert_eq!(doc.totals.bot, 82.0);
        assert_eq!(doc.totals.eot, 71.0);
        assert_eq!(doc.totals.bot_points, 1);
        assert_eq!(doc.totals.midterm_points, 2);
        assert_eq!(doc.totals.eot_points, 3);
        assert_eq!(doc.division.average_aggregate_points, 3.0);
        assert_eq!(doc.division.division, Division::Two);
    }

    #[test]
    fn legend_follows_supplied_bands() {
        let s = student("s1");
        let doc = document(&s, vec![]);
        assert_eq!(doc.legend.len(), default_bands().len());
        let text = doc.to_text();
        assert!(text.contains("GRADING SCALE"));
        assert!(text.contains("D1"));
        assert!(text.contains("Note: No marks recorded"));
        assert!(text.contains("Term: Term II"));
        assert!(text.contains("Generated: 2024-08-02"));
    }

    #[test]
    fn zero_scores_print_blank() {
        let s = student("s1");
        let doc = document(&s, vec![scored("math", 0.0, 60.0, 0.0)]);
        let line = doc
            .to_text()
            .lines()
            .find(|l| l.starts_with("Mathematics"))
            .map(str::to_string)
            .expect("math line");
        assert!(!line.contains(" 0 "), "zero printed in {:?}", line);
        assert!(line.contains("60"));
    }

    #[test]
    fn bundle_starts_each_student_on_a_new_page() {
        let docs = vec![
            document(&student("s1"), vec![scored("math", 82.0, 76.0, 71.0)]),
            document(&student("s2"), vec![]),
        ];
        let bundle = render_class("P7 East", docs, &options());
        assert_eq!(bundle.student_count, 2);
        let fail = bundle
            .division_counts
            .iter()
            .find(|c| c.division == Division::Fail)
            .expect("fail row");
        assert_eq!(fail.count, 1);
        let text = bundle.to_text();
        let pages: Vec<&str> = text.split(PAGE_BREAK).collect();
        assert_eq!(pages.len(), 3);
        assert!(pages[0].contains("Students: 2"));
        assert!(pages[1].contains("Student ID: s1"));
        assert!(pages[2].contains("Student ID: s2"));
    }

    #[test]
    fn number_formatting_trims_trailing_zeroes() {
        assert_eq!(fmt_num(85.0), "85");
        assert_eq!(fmt_num(72.5), "72.5");
        assert_eq!(fmt_num(79.99), "79.99");
        assert_eq!(fmt_opt(None), "");
    }
}
