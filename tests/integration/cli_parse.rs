use clap::Parser;
use cvforge::tooling::cli::ProfileCommands;
use cvforge::tooling::{Cli, Commands};
use std::path::PathBuf;

#[test]
fn run_requires_resume_and_job() {
    assert!(Cli::try_parse_from(["cvforge", "run", "--resume", "cv.pdf"]).is_err());
    assert!(Cli::try_parse_from(["cvforge", "run", "--job", "job.txt"]).is_err());

    let cli = Cli::try_parse_from([
        "cvforge",
        "run",
        "--resume",
        "cv.pdf",
        "--job",
        "job.txt",
        "--github",
        "ada",
        "--max-concurrency",
        "3",
    ])
    .unwrap();
    match cli.command {
        Commands::Run(args) => {
            assert_eq!(args.resume, PathBuf::from("cv.pdf"));
            assert_eq!(args.job, PathBuf::from("job.txt"));
            assert_eq!(args.github.as_deref(), Some("ada"));
            assert_eq!(args.max_concurrency, Some(3));
            assert!(args.linkedin.is_none());
            assert!(args.image.is_none());
        }
        _ => panic!("expected run"),
    }
}

#[test]
fn global_flags_follow_the_subcommand() {
    let cli = Cli::try_parse_from([
        "cvforge",
        "extract",
        "--resume",
        "cv.txt",
        "--job",
        "job.txt",
        "--workspace",
        "/tmp/ws",
        "--log-level",
        "debug",
    ])
    .unwrap();
    assert_eq!(cli.workspace, PathBuf::from("/tmp/ws"));
    assert_eq!(cli.log_level.as_deref(), Some("debug"));
    assert!(matches!(cli.command, Commands::Extract(_)));
}

#[test]
fn workspace_defaults_to_current_directory() {
    let cli = Cli::try_parse_from(["cvforge", "plan"]).unwrap();
    assert_eq!(cli.workspace, PathBuf::from("."));
    match cli.command {
        Commands::Plan { pipeline, format } => {
            assert!(pipeline.is_none());
            assert_eq!(format, "text");
        }
        _ => panic!("expected plan"),
    }
}

#[test]
fn profile_validate_takes_a_path() {
    let cli = Cli::try_parse_from([
        "cvforge",
        "profile",
        "validate",
        "out/candidate_profile.json",
        "--format",
        "json",
    ])
    .unwrap();
    match cli.command {
        Commands::Profile {
            command: ProfileCommands::Validate { path, format },
        } => {
            assert_eq!(path, PathBuf::from("out/candidate_profile.json"));
            assert_eq!(format, "json");
        }
        _ => panic!("expected profile validate"),
    }
    assert!(Cli::try_parse_from(["cvforge", "profile", "validate"]).is_err());
}

#[test]
fn keywords_defaults() {
    let cli = Cli::try_parse_from(["cvforge", "keywords", "--job", "job.txt"]).unwrap();
    match cli.command {
        Commands::Keywords {
            job,
            resume,
            max,
            format,
        } => {
            assert_eq!(job, PathBuf::from("job.txt"));
            assert!(resume.is_none());
            assert!(max.is_none());
            assert_eq!(format, "text");
        }
        _ => panic!("expected keywords"),
    }
}

#[test]
fn unknown_subcommand_is_rejected() {
    assert!(Cli::try_parse_from(["cvforge", "deploy"]).is_err());
}
