//! Integration tests for the `waypoint` binary.
//!
//! Each test runs the compiled binary with an isolated `XDG_CONFIG_HOME`.
//! Commands that talk to a backend point at the stub chat-completions
//! server from `waypoint-test-utils`.

use std::path::{Path, PathBuf};
use std::process::Output;

use serde_json::Value;
use tokio::process::Command;

use waypoint_test_utils::{
    StubReply, intake_reply, outline_reply, sample_profile, sample_project, schedule_reply,
    spawn_stub_chat_server,
};

// -----------------------------------------------------------------------
// Helpers
// -----------------------------------------------------------------------

struct Workspace {
    dir: tempfile::TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: tempfile::TempDir::new().expect("failed to create temp dir"),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path(name);
        std::fs::write(&path, contents).expect("failed to write fixture");
        path
    }

    fn write_json(&self, name: &str, value: &impl serde::Serialize) -> PathBuf {
        self.write(name, &serde_json::to_string_pretty(value).unwrap())
    }

    fn config_home(&self) -> PathBuf {
        self.path("config")
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_waypoint"));
        cmd.env("XDG_CONFIG_HOME", self.config_home())
            .env_remove("WAYPOINT_ENDPOINT")
            .env_remove("WAYPOINT_MODEL")
            .env_remove("WAYPOINT_API_KEY")
            .env_remove("WAYPOINT_TIMEOUT_SECS")
            .env("NO_PROXY", "127.0.0.1,localhost")
            .env("RUST_LOG", "warn");
        cmd
    }

    async fn run(&self, args: &[&str]) -> Output {
        self.command()
            .args(args)
            .output()
            .await
            .expect("failed to run waypoint")
    }

    async fn run_against(&self, endpoint: &str, args: &[&str]) -> Output {
        self.command()
            .env("WAYPOINT_ENDPOINT", endpoint)
            .args(args)
            .output()
            .await
            .expect("failed to run waypoint")
    }
}

fn stdout_json(output: &Output) -> Value {
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn p(path: &Path) -> &str {
    path.to_str().expect("utf-8 path")
}

// -----------------------------------------------------------------------
// Offline commands
// -----------------------------------------------------------------------

#[tokio::test]
async fn init_writes_config_without_api_key() {
    let ws = Workspace::new();
    let output = ws
        .command()
        .env("WAYPOINT_API_KEY", "sk-should-not-be-saved")
        .args([
            "init",
            "--endpoint",
            "http://localhost:1234/v1/chat/completions",
            "--model",
            "local",
        ])
        .output()
        .await
        .unwrap();
    assert!(output.status.success(), "{}", stderr(&output));

    let config_file = ws.config_home().join("waypoint").join("config.toml");
    let text = std::fs::read_to_string(&config_file).unwrap();
    assert!(text.contains("http://localhost:1234/v1/chat/completions"));
    assert!(text.contains("model = \"local\""));
    assert!(!text.contains("sk-should-not-be-saved"));

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&config_file).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

#[tokio::test]
async fn init_refuses_to_overwrite_without_force() {
    let ws = Workspace::new();
    assert!(ws.run(&["init"]).await.status.success());

    let again = ws.run(&["init"]).await;
    assert!(!again.status.success());
    assert!(stderr(&again).contains("--force"));

    assert!(ws.run(&["init", "--force"]).await.status.success());
}

#[tokio::test]
async fn validate_prints_normalized_artifact() {
    let ws = Workspace::new();
    let raw = ws.write(
        "raw.json",
        r#"{"questions":[{"id":"q1","prompt":"Goal?","questionType":"free_text","options":["x"],"position":5}]}"#,
    );
    let output = ws.run(&["validate", "intake_form", p(&raw)]).await;
    let form = stdout_json(&output);
    assert_eq!(form["questions"][0]["options"], serde_json::json!([]));
    assert_eq!(form["questions"][0]["position"], 0);
}

#[tokio::test]
async fn validate_uses_configured_day_policy() {
    let ws = Workspace::new();
    let config_dir = ws.config_home().join("waypoint");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(
        config_dir.join("config.toml"),
        "[generation]\nday_policy = \"sequential\"\n",
    )
    .unwrap();
    let raw = ws.write(
        "raw.json",
        r#"{"tasks":[
            {"day":3,"title":"a","objective":"o","body":"b","estimatedMinutes":10},
            {"day":3,"title":"b","objective":"o","body":"b","estimatedMinutes":10}
        ]}"#,
    );

    let schedule = stdout_json(&ws.run(&["validate", "task_schedule", p(&raw)]).await);
    assert_eq!(schedule["tasks"][0]["day"], 1);
    assert_eq!(schedule["tasks"][1]["day"], 2);
}

#[tokio::test]
async fn validate_defaults_to_non_decreasing_days() {
    let ws = Workspace::new();
    let raw = ws.write(
        "raw.json",
        r#"{"tasks":[
            {"day":3,"title":"a","objective":"o","body":"b","estimatedMinutes":10},
            {"day":3,"title":"b","objective":"o","body":"b","estimatedMinutes":10}
        ]}"#,
    );

    let schedule = stdout_json(&ws.run(&["validate", "task_schedule", p(&raw)]).await);
    assert_eq!(schedule["tasks"][0]["day"], 3);
    assert_eq!(schedule["tasks"][1]["day"], 3);
}

#[tokio::test]
async fn validate_accepts_legacy_stage_name() {
    let ws = Workspace::new();
    let raw = ws.write("raw.json", &outline_reply(&["Plan", "Build", "Ship"]));
    let output = ws.run(&["validate", "chapter_outline", p(&raw)]).await;
    let outline = stdout_json(&output);
    assert_eq!(outline["milestones"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn validate_lists_violations_and_fails() {
    let ws = Workspace::new();
    let raw = ws.write("raw.json", r#"{"milestones":[{"description":"no title"}]}"#);
    let output = ws.run(&["validate", "project_outline", p(&raw)]).await;
    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains("milestones[0].title: required field is missing"), "{err}");
}

#[tokio::test]
async fn unknown_stage_is_rejected_by_argument_parser() {
    let ws = Workspace::new();
    let raw = ws.write("raw.json", "{}");
    let output = ws.run(&["validate", "retrospective", p(&raw)]).await;
    assert!(!output.status.success());
    assert!(stderr(&output).contains("invalid stage"));
}

#[tokio::test]
async fn prompts_list_and_schema() {
    let ws = Workspace::new();
    let list = ws.run(&["prompts", "list"]).await;
    assert!(list.status.success());
    let text = String::from_utf8_lossy(&list.stdout);
    for stage in ["intake_form", "project_outline", "task_schedule"] {
        assert!(text.contains(stage), "missing {stage} in:\n{text}");
    }

    let schema = stdout_json(&ws.run(&["prompts", "schema", "task_schedule"]).await);
    assert_eq!(schema["title"], "task_schedule");
    assert_eq!(schema["type"], "object");
}

#[tokio::test]
async fn alternate_prompt_catalog_is_used() {
    let ws = Workspace::new();
    let catalog = ws.write(
        "prompts.toml",
        r#"
[[prompts]]
stage = "intake_form"
version = "custom-1"
text = "Ask about the goal."

[[prompts]]
stage = "project_outline"
version = "custom-1"
text = "Outline it."

[[prompts]]
stage = "task_schedule"
version = "custom-1"
text = "Schedule it."
"#,
    );
    let output = ws
        .run(&["--prompts", p(&catalog), "prompts", "show", "project_outline"])
        .await;
    assert!(output.status.success(), "{}", stderr(&output));
    let text = String::from_utf8_lossy(&output.stdout);
    assert!(text.contains("version custom-1"));
    assert!(text.contains("Outline it."));
}

#[tokio::test]
async fn incomplete_prompt_catalog_is_an_error() {
    let ws = Workspace::new();
    let catalog = ws.write(
        "prompts.toml",
        "[[prompts]]\nstage = \"intake_form\"\nversion = \"1\"\ntext = \"x\"\n",
    );
    let output = ws.run(&["--prompts", p(&catalog), "prompts", "list"]).await;
    assert!(!output.status.success());
    assert!(stderr(&output).contains("no entry for stage project_outline"));
}

#[tokio::test]
async fn completions_are_generated() {
    let ws = Workspace::new();
    let output = ws.run(&["completions", "bash"]).await;
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("waypoint"));
}

// -----------------------------------------------------------------------
// Backend commands
// -----------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread")]
async fn generate_intake_writes_output_and_record() {
    let server = spawn_stub_chat_server(vec![StubReply::content(intake_reply(3))]).await;
    let ws = Workspace::new();
    let profile = ws.write_json("profile.json", &sample_profile());
    let out = ws.path("form.json");

    let output = ws
        .run_against(
            &server.endpoint,
            &["generate", "intake", "--profile", p(&profile), "--output", p(&out), "--record"],
        )
        .await;
    assert!(output.status.success(), "{}", stderr(&output));

    let form: Value = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(form["questions"].as_array().unwrap().len(), 3);
    let err = stderr(&output);
    assert!(err.contains("\"promptDigest\""), "{err}");
    assert!(err.contains("\"stage\": \"intake_form\""), "{err}");

    let received = server.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0]["response_format"]["type"], "json_object");
}

#[tokio::test(flavor = "multi_thread")]
async fn generate_schedule_for_one_milestone() {
    let server =
        spawn_stub_chat_server(vec![StubReply::content(schedule_reply("Record", 3))]).await;
    let ws = Workspace::new();
    let project = ws.write_json("project.json", &sample_project());
    let outline = ws.write("outline.json", &outline_reply(&["Plan", "Record"]));
    let milestone = ws.write(
        "milestone.json",
        r#"{"title":"Record","summary":"Record the episodes.","position":1}"#,
    );

    let output = ws
        .run_against(
            &server.endpoint,
            &[
                "generate",
                "schedule",
                "--project",
                p(&project),
                "--outline",
                p(&outline),
                "--milestone",
                p(&milestone),
            ],
        )
        .await;
    let schedule = stdout_json(&output);
    let days: Vec<u64> = schedule["tasks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["day"].as_u64().unwrap())
        .collect();
    assert_eq!(days, vec![1, 2, 3]);

    let user = server.received()[0]["messages"][1]["content"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(user.starts_with("SCHEDULE_CONTEXT:"));
    assert!(user.contains("Record the episodes."));
}

#[tokio::test(flavor = "multi_thread")]
async fn generate_reports_schema_violation() {
    let server =
        spawn_stub_chat_server(vec![StubReply::content(r#"{"milestones":[{"title":"x"}]}"#)]).await;
    let ws = Workspace::new();
    let project = ws.write_json("project.json", &sample_project());

    let output = ws
        .run_against(&server.endpoint, &["generate", "outline", "--project", p(&project)])
        .await;
    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains("project_outline generation failed"), "{err}");
    assert!(err.contains("milestones[0].description"), "{err}");
}

#[tokio::test(flavor = "multi_thread")]
async fn plan_generates_outline_and_schedules() {
    let server = spawn_stub_chat_server(vec![
        StubReply::content(outline_reply(&["Plan", "Record", "Publish"])),
        StubReply::content(schedule_reply("Step", 2)),
        StubReply::content(schedule_reply("Step", 2)),
        StubReply::content(schedule_reply("Step", 2)),
    ])
    .await;
    let ws = Workspace::new();
    let project = ws.write_json("project.json", &sample_project());

    let output = ws
        .run_against(
            &server.endpoint,
            &["plan", "--project", p(&project), "--concurrency", "1"],
        )
        .await;
    let plan = stdout_json(&output);
    assert_eq!(plan["outline"]["milestones"].as_array().unwrap().len(), 3);
    assert_eq!(plan["schedules"].as_array().unwrap().len(), 3);
    assert_eq!(server.received().len(), 4);
}
