//! cvforge: LLM agent pipeline for resumes
//!
//! Agents backed by hosted language models run a dependency-ordered graph of
//! tasks. Extraction tasks read a resume, public profiles and a job posting;
//! their findings converge on a schema-validated [`schema::CandidateProfile`]
//! that the generation tasks turn into ATS-ready resume content.

pub mod agent;
pub mod backend;
pub mod capability;
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod schema;
pub mod tooling;
