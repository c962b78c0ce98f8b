//! CandidateProfile: the hand-off contract between extraction and generation.
//!
//! Types are strict. A number where a string is expected (or the reverse) is
//! rejected rather than coerced.

use super::SchemaError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateProfile {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin_url: Option<String>,
    /// Profile url or bare username.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_url: Option<String>,
    pub experience: Vec<Experience>,
    pub education: Vec<Education>,
    pub skills: Skills,
    pub projects: Vec<Project>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_profile: Option<GitHubProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_posting: Option<JobPosting>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_comparison: Option<ResumeComparison>,
    /// Certifications, publications, activities and anything else.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extras: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Experience {
    pub job_title: String,
    pub company: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    /// "Present" for a current role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Education {
    pub degree: String,
    pub institution: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graduation_year: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skills {
    pub technical_skills: Vec<String>,
    pub soft_skills: Vec<String>,
    /// Skill -> endorsement count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endorsements: Option<BTreeMap<String, i64>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    pub description: String,
    pub technologies_used: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitHubProfile {
    pub username: String,
    pub repositories: Vec<Project>,
    /// Commits, pull requests, issues.
    pub contributions: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPosting {
    pub title: String,
    pub company: String,
    pub required_skills: Vec<String>,
    /// Minimum years.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience_required: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeComparison {
    pub matching_skills: Vec<String>,
    pub missing_skills: Vec<String>,
    pub experience_match: String,
    pub improvement_suggestions: Vec<String>,
}

impl CandidateProfile {
    /// Check every required field, naming the first offender, then build the typed profile.
    pub fn from_value(value: Value) -> Result<Self, SchemaError> {
        check_profile(&value)?;
        serde_json::from_value(value).map_err(|e| SchemaError::general(e.to_string()))
    }

    /// Every skill the profile claims, technical first.
    pub fn all_skills(&self) -> impl Iterator<Item = &str> {
        self.skills
            .technical_skills
            .iter()
            .chain(self.skills.soft_skills.iter())
            .map(String::as_str)
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

fn as_object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>, SchemaError> {
    match value {
        Value::Object(map) => Ok(map),
        other if path.is_empty() => Err(SchemaError::general(format!(
            "expected a JSON object, found {}",
            type_name(other)
        ))),
        other => Err(SchemaError::field(
            path,
            format!("expected object, found {}", type_name(other)),
        )),
    }
}

fn required<'a>(obj: &'a Map<String, Value>, path: &str, key: &str) -> Result<&'a Value, SchemaError> {
    match obj.get(key) {
        None | Some(Value::Null) => Err(SchemaError::field(join(path, key), "required field missing")),
        Some(value) => Ok(value),
    }
}

fn required_str(obj: &Map<String, Value>, path: &str, key: &str) -> Result<(), SchemaError> {
    match required(obj, path, key)? {
        Value::String(s) if !s.trim().is_empty() => Ok(()),
        Value::String(_) => Err(SchemaError::field(join(path, key), "must not be empty")),
        other => Err(SchemaError::field(
            join(path, key),
            format!("expected string, found {}", type_name(other)),
        )),
    }
}

fn optional_of(
    obj: &Map<String, Value>,
    path: &str,
    key: &str,
    expected: &'static str,
    matches: fn(&Value) -> bool,
) -> Result<(), SchemaError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(()),
        Some(value) if matches(value) => Ok(()),
        Some(other) => Err(SchemaError::field(
            join(path, key),
            format!("expected {}, found {}", expected, type_name(other)),
        )),
    }
}

fn optional_str(obj: &Map<String, Value>, path: &str, key: &str) -> Result<(), SchemaError> {
    optional_of(obj, path, key, "string", Value::is_string)
}

fn optional_int(obj: &Map<String, Value>, path: &str, key: &str) -> Result<(), SchemaError> {
    optional_of(obj, path, key, "integer", |v| v.is_i64())
}

fn string_list(value: &Value, path: &str) -> Result<(), SchemaError> {
    let Value::Array(items) = value else {
        return Err(SchemaError::field(
            path,
            format!("expected array, found {}", type_name(value)),
        ));
    };
    for (i, item) in items.iter().enumerate() {
        if !item.is_string() {
            return Err(SchemaError::field(
                format!("{}[{}]", path, i),
                format!("expected string, found {}", type_name(item)),
            ));
        }
    }
    Ok(())
}

fn required_str_list(obj: &Map<String, Value>, path: &str, key: &str) -> Result<(), SchemaError> {
    string_list(required(obj, path, key)?, &join(path, key))
}

fn int_map(value: &Value, path: &str) -> Result<(), SchemaError> {
    let map = as_object(value, path)?;
    for (key, count) in map {
        if !count.is_i64() {
            return Err(SchemaError::field(
                join(path, key),
                format!("expected integer, found {}", type_name(count)),
            ));
        }
    }
    Ok(())
}

fn object_list(
    obj: &Map<String, Value>,
    path: &str,
    key: &str,
    check: fn(&Map<String, Value>, &str) -> Result<(), SchemaError>,
) -> Result<(), SchemaError> {
    let list_path = join(path, key);
    let Value::Array(items) = required(obj, path, key)? else {
        return Err(SchemaError::field(list_path, "expected array"));
    };
    for (i, item) in items.iter().enumerate() {
        let item_path = format!("{}[{}]", list_path, i);
        check(as_object(item, &item_path)?, &item_path)?;
    }
    Ok(())
}

fn check_experience(obj: &Map<String, Value>, path: &str) -> Result<(), SchemaError> {
    required_str(obj, path, "job_title")?;
    required_str(obj, path, "company")?;
    optional_str(obj, path, "start_date")?;
    optional_str(obj, path, "end_date")?;
    optional_str(obj, path, "description")
}

fn check_education(obj: &Map<String, Value>, path: &str) -> Result<(), SchemaError> {
    required_str(obj, path, "degree")?;
    required_str(obj, path, "institution")?;
    optional_int(obj, path, "graduation_year")
}

fn check_project(obj: &Map<String, Value>, path: &str) -> Result<(), SchemaError> {
    required_str(obj, path, "name")?;
    required_str(obj, path, "description")?;
    required_str_list(obj, path, "technologies_used")?;
    optional_str(obj, path, "github_link")
}

fn check_skills(obj: &Map<String, Value>, path: &str) -> Result<(), SchemaError> {
    required_str_list(obj, path, "technical_skills")?;
    required_str_list(obj, path, "soft_skills")?;
    match obj.get("endorsements") {
        None | Some(Value::Null) => Ok(()),
        Some(value) => int_map(value, &join(path, "endorsements")),
    }
}

fn check_github_profile(obj: &Map<String, Value>, path: &str) -> Result<(), SchemaError> {
    required_str(obj, path, "username")?;
    object_list(obj, path, "repositories", check_project)?;
    int_map(required(obj, path, "contributions")?, &join(path, "contributions"))
}

fn check_job_posting(obj: &Map<String, Value>, path: &str) -> Result<(), SchemaError> {
    required_str(obj, path, "title")?;
    required_str(obj, path, "company")?;
    required_str_list(obj, path, "required_skills")?;
    optional_int(obj, path, "experience_required")?;
    optional_str(obj, path, "job_description")
}

fn check_resume_comparison(obj: &Map<String, Value>, path: &str) -> Result<(), SchemaError> {
    required_str_list(obj, path, "matching_skills")?;
    required_str_list(obj, path, "missing_skills")?;
    required_str(obj, path, "experience_match")?;
    required_str_list(obj, path, "improvement_suggestions")
}

fn optional_section(
    obj: &Map<String, Value>,
    key: &str,
    check: fn(&Map<String, Value>, &str) -> Result<(), SchemaError>,
) -> Result<(), SchemaError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(()),
        Some(value) => check(as_object(value, key)?, key),
    }
}

fn check_profile(value: &Value) -> Result<(), SchemaError> {
    let obj = as_object(value, "")?;
    required_str(obj, "", "name")?;
    for key in ["email", "phone", "linkedin_url", "github_url"] {
        optional_str(obj, "", key)?;
    }
    object_list(obj, "", "experience", check_experience)?;
    object_list(obj, "", "education", check_education)?;
    check_skills(as_object(required(obj, "", "skills")?, "skills")?, "skills")?;
    object_list(obj, "", "projects", check_project)?;
    optional_section(obj, "github_profile", check_github_profile)?;
    optional_section(obj, "job_posting", check_job_posting)?;
    optional_section(obj, "resume_comparison", check_resume_comparison)?;
    optional_of(obj, "", "extras", "object", Value::is_object)
}
