use serde::{Deserialize, Deserializer, Serialize};

use crate::calc::CalcError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubjectCategory {
    #[default]
    General,
    Subsidiary,
}

impl SubjectCategory {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "general" => Some(Self::General),
            "subsidiary" => Some(Self::Subsidiary),
            _ => None,
        }
    }

    pub fn is_general(self) -> bool {
        self == Self::General
    }
}

impl<'de> Deserialize<'de> for SubjectCategory {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        Self::parse(&raw).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "category must be GENERAL or SUBSIDIARY, got {:?}",
                raw
            ))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: SubjectCategory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectTeacher {
    #[serde(deserialize_with = "de_id")]
    pub subject_id: String,
    #[serde(default)]
    pub teacher_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassInfo {
    #[serde(default)]
    pub name: String,
    /// `None` means the caller never attached a subject list, which is a
    /// contract violation; an empty list is a class with no subjects.
    #[serde(default)]
    pub subjects: Option<Vec<Subject>>,
    #[serde(default)]
    pub subject_teachers: Vec<SubjectTeacher>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodRef {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    #[serde(default, deserialize_with = "de_opt_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub photo: Option<String>,
    #[serde(rename = "class", default)]
    pub class: Option<ClassInfo>,
    #[serde(default)]
    pub term: Option<PeriodRef>,
    #[serde(default)]
    pub academic_year: Option<PeriodRef>,
}

impl Student {
    pub fn term_id(&self) -> Option<&str> {
        self.term.as_ref().map(|t| t.id.as_str())
    }

    pub fn academic_year_id(&self) -> Option<&str> {
        self.academic_year.as_ref().map(|y| y.id.as_str())
    }

    pub fn class_name(&self) -> &str {
        self.class.as_ref().map(|c| c.name.as_str()).unwrap_or("")
    }

    /// Name of the teacher assigned to `subject_id` for this student's class.
    pub fn assigned_teacher(&self, subject_id: &str) -> Option<&str> {
        self.class
            .as_ref()?
            .subject_teachers
            .iter()
            .find(|t| t.subject_id == subject_id)
            .map(|t| t.teacher_name.as_str())
    }
}

/// A student whose identity data has been checked: a report can be produced for it.
#[derive(Debug, Clone)]
pub struct IdentifiedStudent<'a> {
    pub id: &'a str,
    pub student: &'a Student,
    pub subjects: &'a [Subject],
}

pub fn identify(student: &Student) -> Result<IdentifiedStudent<'_>, CalcError> {
    let id = student
        .id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| CalcError::new("bad_params", "student.id is required"))?;
    let subjects = student
        .class
        .as_ref()
        .and_then(|c| c.subjects.as_deref())
        .ok_or_else(|| {
            CalcError::new("bad_params", "student.class.subjects is required").with_details(
                serde_json::json!({ "studentId": id }),
            )
        })?;
    Ok(IdentifiedStudent {
        id,
        student,
        subjects,
    })
}

/// Relational ids arrive as strings or integers depending on the caller.
pub fn de_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    de_opt_id(deserializer)?.ok_or_else(|| serde::de::Error::custom("id must not be null"))
}

pub fn de_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    match raw {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "id must be a string or integer, got {}",
            other
        ))),
    }
}
