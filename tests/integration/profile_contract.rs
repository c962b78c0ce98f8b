use cvforge::config::AppConfig;
use cvforge::error::ApiError;
use cvforge::schema::{
    validate, CandidateProfile, Education, Experience, GitHubProfile, JobPosting, OutputSchema,
    ProfileEnvelope, ProfileStore, Project, ResumeComparison, Skills, CURRENT_SCHEMA_VERSION,
};
use cvforge::tooling::cli::ProfileCommands;
use cvforge::tooling::{CliContext, Commands};
use proptest::collection::{btree_map, vec};
use proptest::option;
use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::BTreeMap;

fn full_profile() -> Value {
    json!({
        "name": "Grace Hopper",
        "email": "grace@example.com",
        "phone": "+1 555 0100",
        "linkedin_url": "https://www.linkedin.com/in/grace",
        "github_url": "grace",
        "experience": [{
            "job_title": "Senior Programmer",
            "company": "Eckert-Mauchly",
            "start_date": "1949-06",
            "end_date": "Present",
            "description": "Built the A-0 system"
        }],
        "education": [{"degree": "PhD Mathematics", "institution": "Yale", "graduation_year": 1934}],
        "skills": {
            "technical_skills": ["COBOL", "Compilers"],
            "soft_skills": ["Teaching"],
            "endorsements": {"COBOL": 42}
        },
        "projects": [{
            "name": "FLOW-MATIC",
            "description": "English-like data processing language",
            "technologies_used": ["UNIVAC I"],
            "github_link": null
        }],
        "github_profile": {
            "username": "grace",
            "repositories": [],
            "contributions": {"commits": 3, "pull_requests": 1}
        },
        "job_posting": {
            "title": "Compiler engineer",
            "company": "Example Corp",
            "required_skills": ["Compilers", "Rust"],
            "experience_required": 5
        },
        "resume_comparison": {
            "matching_skills": ["Compilers"],
            "missing_skills": ["Rust"],
            "experience_match": "Extensive compiler work",
            "improvement_suggestions": ["Mention systems languages"]
        },
        "extras": {"awards": ["National Medal of Technology"]}
    })
}

fn context(workspace: &std::path::Path) -> CliContext {
    CliContext::with_config(workspace.to_path_buf(), AppConfig::default())
}

#[test]
fn model_output_round_trips_through_disk() {
    let raw = format!("Final profile:\n```json\n{}\n```", full_profile());
    let normalized = validate(&raw, &OutputSchema::CandidateProfile).unwrap();
    let profile = CandidateProfile::from_value(normalized.clone()).unwrap();
    assert_eq!(serde_json::to_value(&profile).unwrap(), normalized);

    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("candidate_profile.json");
    let envelope = ProfileEnvelope::new(profile);
    ProfileStore::save(&path, &envelope).unwrap();

    let loaded = ProfileStore::load(&path).unwrap();
    assert_eq!(loaded, envelope);
    assert_eq!(loaded.profile.skills.endorsements.as_ref().unwrap()["COBOL"], 42);
    assert_eq!(
        loaded.profile.job_posting.as_ref().unwrap().experience_required,
        Some(5)
    );

    // The stored profile still satisfies the contract it was validated against.
    let stored: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let again = validate(&stored["profile"].to_string(), &OutputSchema::CandidateProfile).unwrap();
    assert_eq!(again, normalized);
}

#[test]
fn version_one_file_is_migrated_on_load() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("legacy.json");
    std::fs::write(&path, full_profile().to_string()).unwrap();

    let envelope = ProfileStore::load(&path).unwrap();
    assert_eq!(envelope.schema_version, CURRENT_SCHEMA_VERSION);
    assert_eq!(envelope.profile.name, "Grace Hopper");
}

#[test]
fn newer_schema_version_is_a_mismatch() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("future.json");
    let body = json!({
        "schema_version": 3,
        "generated_at": "2026-01-01T00:00:00Z",
        "profile": full_profile()
    });
    std::fs::write(&path, body.to_string()).unwrap();

    match ProfileStore::load(&path) {
        Err(ApiError::SchemaMismatch { found, expected }) => {
            assert_eq!(found, "3");
            assert_eq!(expected, CURRENT_SCHEMA_VERSION);
        }
        other => panic!("expected schema mismatch, got {:?}", other),
    }
}

#[test]
fn wrongly_typed_field_is_rejected_with_its_path() {
    let mut value = full_profile();
    value["github_profile"]["contributions"]["commits"] = json!("three");
    let err = validate(&value.to_string(), &OutputSchema::CandidateProfile).unwrap_err();
    assert_eq!(err.field.as_deref(), Some("github_profile.contributions.commits"));
}

#[test]
fn profile_validate_command_reports_summary() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("candidate_profile.json");
    let profile = CandidateProfile::from_value(full_profile()).unwrap();
    ProfileStore::save(&path, &ProfileEnvelope::new(profile)).unwrap();

    let output = context(temp.path())
        .execute(&Commands::Profile {
            command: ProfileCommands::Validate {
                path: "candidate_profile.json".into(),
                format: "text".to_string(),
            },
        })
        .unwrap();
    assert!(output.contains("Profile valid: Grace Hopper"));
    assert!(output.contains("Experience entries: 1"));
    assert!(output.contains("Missing skills: Rust"));
}

#[test]
fn profile_validate_command_rejects_broken_file() {
    let temp = tempfile::tempdir().unwrap();
    let mut value = full_profile();
    value.as_object_mut().unwrap().remove("skills");
    std::fs::write(temp.path().join("broken.json"), value.to_string()).unwrap();

    let err = context(temp.path())
        .execute(&Commands::Profile {
            command: ProfileCommands::Validate {
                path: "broken.json".into(),
                format: "json".to_string(),
            },
        })
        .unwrap_err();
    match err {
        ApiError::Schema(e) => assert_eq!(e.field.as_deref(), Some("skills")),
        other => panic!("expected schema error, got {:?}", other),
    }
}

fn text() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9 .,+#/-]{0,24}"
}

fn words() -> impl Strategy<Value = Vec<String>> {
    vec(text(), 0..4)
}

fn counts() -> impl Strategy<Value = BTreeMap<String, i64>> {
    btree_map("[a-z_]{1,12}", any::<i64>(), 0..4)
}

fn project() -> impl Strategy<Value = Project> {
    (text(), text(), words(), option::of(text())).prop_map(
        |(name, description, technologies_used, github_link)| Project {
            name,
            description,
            technologies_used,
            github_link,
        },
    )
}

fn experience() -> impl Strategy<Value = Experience> {
    (
        text(),
        text(),
        option::of(text()),
        option::of(text()),
        option::of(text()),
    )
        .prop_map(
            |(job_title, company, start_date, end_date, description)| Experience {
                job_title,
                company,
                start_date,
                end_date,
                description,
            },
        )
}

fn education() -> impl Strategy<Value = Education> {
    (text(), text(), option::of(1900i64..2100)).prop_map(
        |(degree, institution, graduation_year)| Education {
            degree,
            institution,
            graduation_year,
        },
    )
}

fn skills() -> impl Strategy<Value = Skills> {
    (words(), words(), option::of(counts())).prop_map(
        |(technical_skills, soft_skills, endorsements)| Skills {
            technical_skills,
            soft_skills,
            endorsements,
        },
    )
}

fn github_profile() -> impl Strategy<Value = GitHubProfile> {
    (text(), vec(project(), 0..3), counts()).prop_map(|(username, repositories, contributions)| {
        GitHubProfile {
            username,
            repositories,
            contributions,
        }
    })
}

fn job_posting() -> impl Strategy<Value = JobPosting> {
    (
        text(),
        text(),
        words(),
        option::of(any::<i64>()),
        option::of(text()),
    )
        .prop_map(
            |(title, company, required_skills, experience_required, job_description)| JobPosting {
                title,
                company,
                required_skills,
                experience_required,
                job_description,
            },
        )
}

fn resume_comparison() -> impl Strategy<Value = ResumeComparison> {
    (words(), words(), text(), words()).prop_map(
        |(matching_skills, missing_skills, experience_match, improvement_suggestions)| {
            ResumeComparison {
                matching_skills,
                missing_skills,
                experience_match,
                improvement_suggestions,
            }
        },
    )
}

fn extras() -> impl Strategy<Value = BTreeMap<String, Value>> {
    btree_map(
        "[a-z_]{1,10}",
        prop_oneof![
            text().prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            words().prop_map(Value::from),
        ],
        0..3,
    )
}

fn candidate_profile() -> impl Strategy<Value = CandidateProfile> {
    let contact = (
        text(),
        option::of(text()),
        option::of(text()),
        option::of(text()),
        option::of(text()),
    );
    let history = (
        vec(experience(), 0..3),
        vec(education(), 0..3),
        skills(),
        vec(project(), 0..3),
    );
    let enrichment = (
        option::of(github_profile()),
        option::of(job_posting()),
        option::of(resume_comparison()),
        extras(),
    );
    (contact, history, enrichment).prop_map(
        |(
            (name, email, phone, linkedin_url, github_url),
            (experience, education, skills, projects),
            (github_profile, job_posting, resume_comparison, extras),
        )| CandidateProfile {
            name,
            email,
            phone,
            linkedin_url,
            github_url,
            experience,
            education,
            skills,
            projects,
            github_profile,
            job_posting,
            resume_comparison,
            extras,
        },
    )
}

proptest! {
    #[test]
    fn any_profile_validates_to_itself_and_stays_fixed(profile in candidate_profile()) {
        let expected = serde_json::to_value(&profile).unwrap();
        let raw = format!(
            "Here is the structured profile:\n{}\nLet me know if anything is missing.",
            serde_json::to_string(&profile).unwrap()
        );
        let first = validate(&raw, &OutputSchema::CandidateProfile).unwrap();
        prop_assert_eq!(&first, &expected);

        let again = validate(&first.to_string(), &OutputSchema::CandidateProfile).unwrap();
        prop_assert_eq!(&again, &first);
    }

    #[test]
    fn any_profile_round_trips_through_json(profile in candidate_profile()) {
        let value = serde_json::to_value(&profile).unwrap();
        let back = CandidateProfile::from_value(value).unwrap();
        prop_assert_eq!(back, profile);
    }
}
