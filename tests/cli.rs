use assert_cmd::Command;
use clap::Parser;
use predicates::prelude::*;
use serial_test::serial;
use std::fs::{self, write};
use std::sync::{Arc, Mutex};
use tempfile::{tempdir, NamedTempFile};
use tracing_subscriber::prelude::*; // needed for .with()
use tracing_subscriber::{layer::Context, Layer, Registry};

use pdk_pipeline::cli::{run, Cli, Commands};

/// Creates a config for the `Demo` repository with fan-out over the given prefixes.
fn create_config(prefixes: &str) -> NamedTempFile {
    let config = NamedTempFile::new().expect("Creating temp config file failed");
    write(
        config.path(),
        format!(
            "pipeline:\n  repository_name: Demo\n  default_branch_name: mainline\n  branch_name_prefixes: {prefixes}\n  primary_synth_directory: cdk.out\nstages:\n  - name: Beta\n"
        ),
    )
    .expect("Writing temp config failed");
    config
}

#[test]
fn synth_on_default_branch_provisions_feature_trigger() {
    let config = create_config("[\"\"]");
    let out = tempdir().unwrap();

    let mut cmd = Command::cargo_bin("pdk-pipeline").expect("Binary exists");
    cmd.arg("synth")
        .arg("--config")
        .arg(config.path())
        .arg("--out")
        .arg(out.path())
        .env_remove("BRANCH");

    cmd.assert()
        .success()
        .stdout(
            predicate::str::contains("Synthesis complete")
                .and(predicate::str::contains("Feature branch triggers: 1")),
        );

    let template = fs::read_to_string(out.path().join("ApplicationPipeline.template.yaml"))
        .expect("template written");
    assert!(template.contains("FeatureBranchTrigger0"));
    assert!(!template.contains("FeatureBranch: "));
    assert!(out.path().join("manifest.json").exists());
}

#[test]
fn synth_on_feature_branch_tags_stages() {
    let config = create_config("[feature]");
    let out = tempdir().unwrap();

    let mut cmd = Command::cargo_bin("pdk-pipeline").expect("Binary exists");
    cmd.arg("synth")
        .arg("--config")
        .arg(config.path())
        .arg("--out")
        .arg(out.path())
        .env("BRANCH", "feature/x");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Feature branch triggers: 0"));

    let template =
        fs::read_to_string(out.path().join("ApplicationPipeline-feature-x.template.yaml"))
            .expect("per-branch template written");
    assert!(template.contains("FeatureBranch: feature/x"));
    assert!(template.contains("RepoName: Demo"));
}

#[test]
fn synth_without_repository_fails_with_configuration_message() {
    let config = NamedTempFile::new().unwrap();
    write(config.path(), "pipeline:\n  primary_synth_directory: cdk.out\n").unwrap();
    let out = tempdir().unwrap();

    let mut cmd = Command::cargo_bin("pdk-pipeline").expect("Binary exists");
    cmd.arg("synth")
        .arg("--config")
        .arg(config.path())
        .arg("--out")
        .arg(out.path().join("never"))
        .env_remove("BRANCH");

    cmd.assert().failure().stderr(
        predicate::str::contains("Either repositoryName or codestarConnectionArn must be provided")
            .and(predicate::str::contains("pdk-pipeline aborted")),
    );
    assert!(!out.path().join("never").exists(), "nothing may be written on failure");
}

#[test]
fn sample_api_is_written_once() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("spec/main.yaml");

    Command::cargo_bin("pdk-pipeline")
        .unwrap()
        .args(["sample-api", "--language", "python", "--path"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("written"));
    let first = fs::read(&path).unwrap();

    Command::cargo_bin("pdk-pipeline")
        .unwrap()
        .args(["sample-api", "--language", "python", "--path"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("skipped"));
    assert_eq!(fs::read(&path).unwrap(), first);
}

#[test]
#[serial]
fn branch_is_read_from_environment_when_flag_absent() {
    std::env::set_var("BRANCH", "feature/env");
    let cli = Cli::try_parse_from(["pdk-pipeline", "synth", "--config", "pipeline.yaml"]);
    std::env::remove_var("BRANCH");

    match cli.expect("arguments parse").command {
        Commands::Synth { branch, .. } => assert_eq!(branch.as_deref(), Some("feature/env")),
        Commands::SampleApi { .. } => panic!("wrong subcommand"),
    }
}

#[test]
#[serial]
fn branch_flag_wins_over_environment() {
    std::env::set_var("BRANCH", "feature/env");
    let cli = Cli::try_parse_from([
        "pdk-pipeline",
        "synth",
        "--config",
        "pipeline.yaml",
        "--branch",
        "fix/flag",
    ]);
    std::env::remove_var("BRANCH");

    match cli.expect("arguments parse").command {
        Commands::Synth { branch, .. } => assert_eq!(branch.as_deref(), Some("fix/flag")),
        Commands::SampleApi { .. } => panic!("wrong subcommand"),
    }
}

/// Custom Layer to collect emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        use std::fmt::Write as FmtWrite;
        let mut msg = String::new();
        let _ = write!(&mut msg, "{:?}", event);
        self.events.lock().unwrap().push(msg);
    }
}

#[test]
fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let cli = Cli {
        command: Commands::Synth {
            config: std::path::PathBuf::from("dummy.yaml"),
            out: std::path::PathBuf::from("cdk.out"),
            branch: None,
        },
    };

    let result = run(cli);
    assert!(result.is_err(), "dummy config does not exist");

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}
