//! Local job-posting keyword analysis.
//!
//! Categorizes technical skills, soft skills, requirements and recurring domain
//! terms in a job description, and optionally measures how many of them a
//! resume mentions. Runs entirely in-process.

use super::{
    CapabilityKind, CapabilityOutput, CapabilityProvider, CapabilityRequest, ProviderFailure,
};
use crate::config::KeywordsConfig;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::ops::Range;

const NAME: &str = "job_keywords";

const STOP_WORDS: &[&str] = &[
    "the", "and", "a", "an", "in", "on", "at", "to", "for", "with", "by", "of", "is", "are", "be",
    "will", "have", "has", "had", "this", "that", "these", "those", "we", "you", "they", "it",
    "from", "as", "or", "not", "but", "all", "our", "your", "their", "its", "can", "may", "about",
    "who", "when", "where", "which", "what", "how", "why", "any", "some", "such", "time", "same",
    "than", "then", "now", "every", "each", "only", "very", "just", "should", "would", "work",
    "team", "experience", "years", "including", "strong", "ability", "role", "join", "looking",
    "plus", "also", "must", "well", "more", "into", "other", "using",
];

const TECHNICAL_SKILLS: &[(&str, &[&str])] = &[
    (
        "programming_languages",
        &[
            "python", "java", "javascript", "typescript", "c++", "c#", "ruby", "php", "scala",
            "kotlin", "go", "golang", "rust", "swift", "perl", "shell",
        ],
    ),
    (
        "web_development",
        &[
            "html", "css", "react", "angular", "vue", "node", "express", "django", "flask",
            "spring", "asp.net", "ruby on rails", "jquery", "bootstrap",
        ],
    ),
    (
        "data_science",
        &[
            "machine learning", "deep learning", "artificial intelligence", "data mining", "nlp",
            "natural language processing", "computer vision", "neural networks", "pytorch",
            "tensorflow", "keras", "scikit-learn",
        ],
    ),
    (
        "databases",
        &[
            "sql", "mysql", "postgresql", "mongodb", "nosql", "redis", "oracle", "dynamodb",
            "cassandra", "firebase", "elasticsearch",
        ],
    ),
    (
        "cloud",
        &[
            "aws", "azure", "gcp", "google cloud", "serverless", "lambda", "kubernetes", "docker",
        ],
    ),
    (
        "devops",
        &[
            "ci/cd", "jenkins", "gitlab", "github actions", "terraform", "ansible", "monitoring",
            "devops",
        ],
    ),
    ("tools", &["git", "jira", "confluence", "figma", "vscode"]),
];

const SOFT_SKILLS: &[&str] = &[
    "communication", "leadership", "teamwork", "collaboration", "problem solving",
    "critical thinking", "time management", "adaptability", "creativity", "mentoring",
    "ownership", "attention to detail",
];

const REQUIREMENT_TERMS: &[&str] = &[
    "bachelor", "master", "phd", "mba", "degree", "computer science", "certification",
    "certified", "certificate", "license", "remote", "on-site", "hybrid", "full-time",
    "part-time",
];

const SYNONYMS: &[(&str, &str)] = &[
    ("react.js", "react"),
    ("reactjs", "react"),
    ("vue.js", "vue"),
    ("vuejs", "vue"),
    ("node.js", "node"),
    ("nodejs", "node"),
    ("postgres", "postgresql"),
    ("k8s", "kubernetes"),
    ("cicd", "ci/cd"),
    ("continuous integration", "ci/cd"),
    ("continuous deployment", "ci/cd"),
];

/// Keyword analysis of a job description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordReport {
    /// Category -> keyword -> occurrences.
    pub technical_skills: BTreeMap<String, BTreeMap<String, usize>>,
    pub soft_skills: BTreeMap<String, usize>,
    pub requirements: BTreeMap<String, usize>,
    /// Recurring terms outside the known vocabularies.
    pub domain_keywords: BTreeMap<String, usize>,
    /// Highest-count keywords across all groups, best first.
    pub top_keywords: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_match: Option<ResumeMatch>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeMatch {
    pub matched: Vec<String>,
    pub missing: Vec<String>,
    pub match_percentage: u32,
}

impl KeywordReport {
    pub fn render(&self) -> String {
        let mut out = String::new();
        if !self.technical_skills.is_empty() {
            out.push_str("Technical skills:\n");
            for (category, skills) in &self.technical_skills {
                let list: Vec<&str> = skills.keys().map(String::as_str).collect();
                out.push_str(&format!("  {}: {}\n", category, list.join(", ")));
            }
        }
        if !self.soft_skills.is_empty() {
            let list: Vec<&str> = self.soft_skills.keys().map(String::as_str).collect();
            out.push_str(&format!("Soft skills: {}\n", list.join(", ")));
        }
        if !self.requirements.is_empty() {
            let list: Vec<&str> = self.requirements.keys().map(String::as_str).collect();
            out.push_str(&format!("Requirements: {}\n", list.join(", ")));
        }
        if !self.domain_keywords.is_empty() {
            let list: Vec<&str> = self.domain_keywords.keys().map(String::as_str).collect();
            out.push_str(&format!("Domain terms: {}\n", list.join(", ")));
        }
        if let Some(m) = &self.resume_match {
            out.push_str(&format!(
                "Resume keyword match: {}% ({} of {})\n",
                m.match_percentage,
                m.matched.len(),
                m.matched.len() + m.missing.len()
            ));
            if !m.missing.is_empty() {
                out.push_str(&format!("Missing: {}\n", m.missing.join(", ")));
            }
        }
        if out.is_empty() {
            out.push_str("No keywords found.");
        }
        out.trim_end().to_string()
    }
}

/// A vocabulary term matched on whole-word boundaries. `+` and `#` count as
/// word characters so `c++` and `c#` stand on their own.
struct TermPattern {
    term: String,
    pattern: Regex,
}

impl TermPattern {
    fn new(term: &str) -> Result<Self, regex::Error> {
        let pattern = Regex::new(&format!(
            r"(?:^|[^\w+#])({})(?:$|[^\w+#])",
            regex::escape(term)
        ))?;
        Ok(Self {
            term: term.to_string(),
            pattern,
        })
    }

    /// Byte ranges of every match. The search resumes at the end of the term
    /// so a separator shared by two adjacent matches serves both.
    fn ranges(&self, haystack: &str) -> Vec<Range<usize>> {
        let mut found = Vec::new();
        let mut at = 0;
        while let Some(term) = self
            .pattern
            .captures_at(haystack, at)
            .and_then(|caps| caps.get(1))
        {
            found.push(term.range());
            at = term.end();
        }
        found
    }

    fn count(&self, haystack: &str) -> usize {
        self.ranges(haystack).len()
    }

    fn replace_all(&self, haystack: &str, replacement: &str) -> String {
        let mut out = String::with_capacity(haystack.len());
        let mut last = 0;
        for range in self.ranges(haystack) {
            out.push_str(&haystack[last..range.start]);
            out.push_str(replacement);
            last = range.end;
        }
        out.push_str(&haystack[last..]);
        out
    }
}

struct Vocabulary {
    technical: Vec<(&'static str, Vec<TermPattern>)>,
    soft_skills: Vec<TermPattern>,
    requirements: Vec<TermPattern>,
    synonyms: Vec<(TermPattern, &'static str)>,
}

impl Vocabulary {
    fn build() -> Result<Self, regex::Error> {
        let compile = |terms: &[&str]| -> Result<Vec<TermPattern>, regex::Error> {
            terms.iter().map(|term| TermPattern::new(term)).collect()
        };
        let technical = TECHNICAL_SKILLS
            .iter()
            .map(|(category, terms)| -> Result<_, regex::Error> {
                Ok((*category, compile(terms)?))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let synonyms = SYNONYMS
            .iter()
            .map(|(from, to)| -> Result<_, regex::Error> { Ok((TermPattern::new(from)?, *to)) })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            technical,
            soft_skills: compile(SOFT_SKILLS)?,
            requirements: compile(REQUIREMENT_TERMS)?,
            synonyms,
        })
    }

    fn known_terms(&self) -> Vec<&str> {
        self.technical
            .iter()
            .flat_map(|(_, terms)| terms.iter())
            .chain(self.soft_skills.iter())
            .chain(self.requirements.iter())
            .map(|p| p.term.as_str())
            .collect()
    }
}

static VOCABULARY: Lazy<Vocabulary> =
    Lazy::new(|| Vocabulary::build().expect("Escaped keyword patterns must compile"));

static EXPERIENCE_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d+)\s*(?:-|to)\s*(\d+)\s*\+?\s*(?:years?|yrs?)\b")
        .expect("Experience range pattern must compile")
});

static EXPERIENCE_FLOOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:minimum\s+of|at\s+least)\s+(\d+)\s*\+?(?:\s*(?:years?|yrs?)\b)?")
        .expect("Experience floor pattern must compile")
});

static EXPERIENCE_SINGLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d+)\s*\+?\s*(?:years?|yrs?)\b")
        .expect("Experience pattern must compile")
});

static WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\w][\w-]*").expect("Word pattern must compile"));

fn normalize(text: &str) -> String {
    let mut lowered = text.to_lowercase();
    for (from, to) in &VOCABULARY.synonyms {
        lowered = from.replace_all(&lowered, to);
    }
    lowered
}

fn count_terms(text: &str, terms: &[TermPattern]) -> BTreeMap<String, usize> {
    terms
        .iter()
        .filter_map(|pattern| {
            let n = pattern.count(text);
            (n > 0).then(|| (pattern.term.clone(), n))
        })
        .collect()
}

/// Years-of-experience requirements: ranges ("3-5 years"), floors ("at least
/// 4", "minimum of 2 years") and single values ("5+ years", "1 year").
fn experience_requirements(text: &str) -> BTreeMap<String, usize> {
    let mut found = BTreeMap::new();
    let mut covered: Vec<Range<usize>> = Vec::new();

    for caps in EXPERIENCE_RANGE.captures_iter(text) {
        let (Some(whole), Some(low), Some(high)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        *found
            .entry(format!("{}-{} years experience", low.as_str(), high.as_str()))
            .or_insert(0) += 1;
        covered.push(whole.range());
    }
    for caps in EXPERIENCE_FLOOR.captures_iter(text) {
        let (Some(whole), Some(years)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        *found
            .entry(format!("{}+ years experience", years.as_str()))
            .or_insert(0) += 1;
        covered.push(whole.range());
    }
    for caps in EXPERIENCE_SINGLE.captures_iter(text) {
        let (Some(whole), Some(years)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let overlaps = covered
            .iter()
            .any(|r| whole.start() < r.end && r.start < whole.end());
        if !overlaps {
            *found
                .entry(format!("{}+ years experience", years.as_str()))
                .or_insert(0) += 1;
        }
    }
    found
}

fn domain_terms(text: &str, known: &[&str], limit: usize) -> BTreeMap<String, usize> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for word in WORD
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|w| w.chars().count() > 3)
        .filter(|w| !w.chars().all(|c| c.is_ascii_digit()))
    {
        if STOP_WORDS.contains(&word) || known.contains(&word) {
            continue;
        }
        *counts.entry(word).or_insert(0) += 1;
    }
    let mut ranked: Vec<(&str, usize)> = counts.into_iter().filter(|(_, n)| *n >= 2).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(limit)
        .map(|(w, n)| (w.to_string(), n))
        .collect()
}

/// Analyze a job description, optionally against resume text.
pub fn analyze(job_description: &str, resume_text: Option<&str>, max_keywords: usize) -> KeywordReport {
    let text = normalize(job_description);

    let vocabulary = &*VOCABULARY;

    let mut technical_skills = BTreeMap::new();
    for (category, terms) in &vocabulary.technical {
        let found = count_terms(&text, terms);
        if !found.is_empty() {
            technical_skills.insert(category.to_string(), found);
        }
    }
    let known = vocabulary.known_terms();

    let soft_skills = count_terms(&text, &vocabulary.soft_skills);
    let mut requirements = count_terms(&text, &vocabulary.requirements);
    requirements.extend(experience_requirements(&text));
    let domain_keywords = domain_terms(&text, &known, 10);

    let mut ranked: Vec<(String, usize)> = technical_skills
        .values()
        .flat_map(|m| m.iter())
        .chain(soft_skills.iter())
        .chain(requirements.iter())
        .chain(domain_keywords.iter())
        .map(|(k, v)| (k.clone(), *v))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.dedup_by(|a, b| a.0 == b.0);
    let top_keywords: Vec<String> = ranked
        .into_iter()
        .take(max_keywords.max(1))
        .map(|(k, _)| k)
        .collect();

    let resume_match = resume_text.map(|resume| {
        let resume = normalize(resume);
        let (matched, missing): (Vec<String>, Vec<String>) = top_keywords
            .iter()
            .cloned()
            .partition(|k| {
                TermPattern::new(k)
                    .map(|pattern| pattern.count(&resume) > 0)
                    .unwrap_or(false)
            });
        let total = matched.len() + missing.len();
        let match_percentage = if total == 0 {
            0
        } else {
            ((matched.len() * 100) as f64 / total as f64).round() as u32
        };
        ResumeMatch {
            matched,
            missing,
            match_percentage,
        }
    });

    KeywordReport {
        technical_skills,
        soft_skills,
        requirements,
        domain_keywords,
        top_keywords,
        resume_match,
    }
}

pub struct JobKeywordProvider {
    max_keywords: usize,
}

impl JobKeywordProvider {
    pub fn new(max_keywords: usize) -> Self {
        Self { max_keywords }
    }

    pub fn from_config(config: &KeywordsConfig) -> Self {
        Self::new(config.max_keywords)
    }
}

#[async_trait]
impl CapabilityProvider for JobKeywordProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn kind(&self) -> CapabilityKind {
        CapabilityKind::JobKeywords
    }

    fn description(&self) -> &str {
        "Extracts categorized skills and requirements from a job description and scores resume coverage."
    }

    async fn invoke(&self, request: CapabilityRequest) -> Result<CapabilityOutput, ProviderFailure> {
        match request {
            CapabilityRequest::JobKeywords {
                job_description,
                resume_text,
            } => Ok(CapabilityOutput::Keywords(analyze(
                &job_description,
                resume_text.as_deref(),
                self.max_keywords,
            ))),
            other => Err(ProviderFailure::wrong_request(NAME, &other)),
        }
    }
}
