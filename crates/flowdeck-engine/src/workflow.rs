//! Workflow data model.
//!
//! A workflow is a named, ordered list of [`CommandStep`]s.  Each step has a
//! [`StepKind`] that decides how it is executed; the kind is a closed set so
//! adding one is caught by every `match` in the executor.
//!
//! Steps are stored as a JSON array.  A step serializes flat, with the kind
//! as a `kind` tag next to the common fields:
//!
//! ```json
//! {"id": "s1", "kind": "terminal_command", "payload": "npm run dev",
//!  "commands": ["npm i", "npm run dev"], "working_directory": "/srv/app",
//!  "delay_after_seconds": 2}
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use flowdeck_store::StoredWorkflow;

use crate::error::Result;

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// What a container step asks the engine to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerAction {
    Start,
    Stop,
}

impl std::fmt::Display for ContainerAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Stop => write!(f, "stop"),
        }
    }
}

impl std::str::FromStr for ContainerAction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            other => Err(format!("unknown container action `{other}`")),
        }
    }
}

/// The execution strategy of a step, with the fields only that strategy uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepKind {
    /// Launch an application.  The payload is its path or name.
    Application,
    /// Run shell command lines.  The payload is the single-command fallback
    /// used when `commands` is empty.
    TerminalCommand {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        commands: Vec<String>,
        /// Spawn a visible terminal instead of capturing output.
        #[serde(default)]
        run_in_own_terminal_window: bool,
    },
    /// Open a URL.  The payload is the URL.
    Url,
    /// Start or stop a container.  The payload is only a label.
    ///
    /// Both fields are optional on the wire so an incomplete step still
    /// loads and is rejected at execution time.
    Container {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        container_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        action: Option<ContainerAction>,
    },
    /// A stored step that did not decode.  It keeps its slot in the
    /// workflow so the run records it as failed and carries on; `raw` is
    /// written back untouched when the step list is saved.
    #[serde(skip)]
    Invalid {
        reason: String,
        raw: serde_json::Value,
    },
}

/// Kind tags a stored step may carry.
const KNOWN_KINDS: &[&str] = &["application", "terminal_command", "url", "container"];

impl StepKind {
    /// Short tag used in logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Application => "application",
            Self::TerminalCommand { .. } => "terminal_command",
            Self::Url => "url",
            Self::Container { .. } => "container",
            Self::Invalid { .. } => "invalid",
        }
    }
}

/// One typed action inside a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandStep {
    /// Unique within the owning workflow; reported to progress sinks.
    pub id: String,
    #[serde(flatten)]
    pub kind: StepKind,
    /// Kind-dependent primary value (path, command line, URL, label).
    #[serde(default)]
    pub payload: String,
    /// Applies to application and terminal steps only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<PathBuf>,
    /// Pause after this step before the next one starts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_after_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CommandStep {
    pub fn new(id: impl Into<String>, kind: StepKind, payload: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            payload: payload.into(),
            working_directory: None,
            delay_after_seconds: None,
            description: None,
        }
    }

    pub fn application(id: impl Into<String>, app: impl Into<String>) -> Self {
        Self::new(id, StepKind::Application, app)
    }

    /// A captured terminal step running `commands` in order.
    pub fn terminal(id: impl Into<String>, commands: &[&str]) -> Self {
        let commands: Vec<String> = commands.iter().map(|c| c.to_string()).collect();
        let payload = commands.first().cloned().unwrap_or_default();
        Self::new(
            id,
            StepKind::TerminalCommand {
                commands,
                run_in_own_terminal_window: false,
            },
            payload,
        )
    }

    pub fn url(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(id, StepKind::Url, url)
    }

    pub fn container(
        id: impl Into<String>,
        container_id: impl Into<String>,
        action: ContainerAction,
    ) -> Self {
        let container_id = container_id.into();
        Self::new(
            id,
            StepKind::Container {
                container_id: Some(container_id.clone()),
                action: Some(action),
            },
            container_id,
        )
    }

    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    pub fn with_delay(mut self, seconds: f64) -> Self {
        self.delay_after_seconds = Some(seconds);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Decode one stored step.  Anything that does not decode becomes a
    /// [`StepKind::Invalid`] step, keeping whatever id, payload and delay
    /// can still be read.  `index` names steps that lack an id.
    pub fn decode(index: usize, raw: serde_json::Value) -> Self {
        match serde_json::from_value::<Self>(raw.clone()) {
            Ok(step) => step,
            Err(e) => {
                let text = |key: &str| raw.get(key).and_then(serde_json::Value::as_str).map(String::from);
                let id = text("id").unwrap_or_else(|| format!("step-{}", index + 1));
                let payload = text("payload").unwrap_or_default();
                let description = text("description");
                let delay_after_seconds = raw.get("delay_after_seconds").and_then(serde_json::Value::as_f64);
                let reason = invalid_reason(&raw, &e);
                Self {
                    id,
                    kind: StepKind::Invalid { reason, raw },
                    payload,
                    working_directory: None,
                    delay_after_seconds,
                    description,
                }
            }
        }
    }

    /// The configured post-step pause, if it is a positive finite number.
    pub fn delay_after(&self) -> Option<Duration> {
        self.delay_after_seconds
            .filter(|s| *s > 0.0)
            .and_then(|s| Duration::try_from_secs_f64(s).ok())
    }
}

fn invalid_reason(raw: &serde_json::Value, err: &serde_json::Error) -> String {
    match raw.get("kind").and_then(serde_json::Value::as_str) {
        None => return "Step has no kind".to_string(),
        Some(kind) if !KNOWN_KINDS.contains(&kind) => {
            return format!("Unsupported step kind: {kind}");
        }
        Some("container") => {
            if let Some(action) = raw.get("action").and_then(serde_json::Value::as_str) {
                if !matches!(action, "start" | "stop") {
                    return format!("Unknown container action: {action}");
                }
            }
        }
        Some(_) => {}
    }
    format!("Invalid step definition: {err}")
}

// ---------------------------------------------------------------------------
// Workflows
// ---------------------------------------------------------------------------

/// A complete workflow definition as the engine sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub name: String,
    /// Execution order.
    pub steps: Vec<CommandStep>,
    pub is_favorite: bool,
    pub display_order: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Workflow {
    /// Decode a stored row.  A `null` step list decodes as empty; a step
    /// list that is not an array is an error.  Individual steps never fail
    /// the decode, see [`CommandStep::decode`].
    pub fn from_stored(stored: StoredWorkflow) -> Result<Self> {
        let steps = if stored.steps.is_null() {
            Vec::new()
        } else {
            serde_json::from_value::<Vec<serde_json::Value>>(stored.steps)?
                .into_iter()
                .enumerate()
                .map(|(index, raw)| CommandStep::decode(index, raw))
                .collect()
        };
        Ok(Self {
            id: stored.id,
            name: stored.name,
            steps,
            is_favorite: stored.is_favorite,
            display_order: stored.display_order,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        })
    }
}

/// Encode a step list for [`flowdeck_store::WorkflowStore::update_steps`].
///
/// Invalid steps are written back exactly as they were read.
pub fn steps_to_json(steps: &[CommandStep]) -> Result<serde_json::Value> {
    steps
        .iter()
        .map(|step| match &step.kind {
            StepKind::Invalid { raw, .. } => Ok(raw.clone()),
            _ => Ok(serde_json::to_value(step)?),
        })
        .collect::<Result<Vec<_>>>()
        .map(serde_json::Value::Array)
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// The outcome of executing one step.  Transient; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub step_id: String,
    pub succeeded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Structured detail, e.g. per-sub-command output of a terminal step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<serde_json::Value>,
}

impl ExecutionResult {
    pub fn success(step_id: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            succeeded: true,
            message: None,
            raw_output: None,
        }
    }

    pub fn failure(step_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            succeeded: false,
            message: Some(message.into()),
            raw_output: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_raw_output(mut self, raw: serde_json::Value) -> Self {
        self.raw_output = Some(raw);
        self
    }
}

/// The aggregated outcome of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub workflow_id: String,
    /// True iff every attempted step succeeded (and at least the workflow
    /// loaded).
    pub succeeded: bool,
    /// Set when the run failed before any step was attempted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// One entry per attempted step, in execution order.
    pub steps: Vec<ExecutionResult>,
}

impl RunResult {
    /// A run rejected before execution: no step results.
    pub fn rejected(workflow_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            succeeded: false,
            message: Some(message.into()),
            steps: Vec::new(),
        }
    }

    pub fn failed_steps(&self) -> impl Iterator<Item = &ExecutionResult> {
        self.steps.iter().filter(|r| !r.succeeded)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn terminal_step_wire_format() {
        let step: CommandStep = serde_json::from_value(json!({
            "id": "s1",
            "kind": "terminal_command",
            "payload": "npm run dev",
            "commands": ["npm i", "npm run dev"],
            "working_directory": "/srv/app",
            "delay_after_seconds": 2
        }))
        .unwrap();

        assert_eq!(
            step.kind,
            StepKind::TerminalCommand {
                commands: vec!["npm i".into(), "npm run dev".into()],
                run_in_own_terminal_window: false,
            }
        );
        assert_eq!(step.working_directory, Some(PathBuf::from("/srv/app")));
        assert_eq!(step.delay_after(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn container_step_may_be_incomplete() {
        let step: CommandStep =
            serde_json::from_value(json!({"id": "c", "kind": "container", "payload": "db"}))
                .unwrap();
        assert_eq!(
            step.kind,
            StepKind::Container {
                container_id: None,
                action: None
            }
        );
    }

    #[test]
    fn step_serializes_flat() {
        let value = serde_json::to_value(CommandStep::url("u", "https://example.com")).unwrap();
        assert_eq!(
            value,
            json!({"id": "u", "kind": "url", "payload": "https://example.com"})
        );
    }

    #[test]
    fn unknown_kind_rejected() {
        let err = serde_json::from_value::<CommandStep>(json!({"id": "x", "kind": "teleport"}));
        assert!(err.is_err());
    }

    #[test]
    fn delay_ignores_zero_and_negative() {
        assert_eq!(CommandStep::url("a", "x").delay_after(), None);
        assert_eq!(CommandStep::url("a", "x").with_delay(0.0).delay_after(), None);
        assert_eq!(CommandStep::url("a", "x").with_delay(-3.0).delay_after(), None);
        assert_eq!(
            CommandStep::url("a", "x").with_delay(0.5).delay_after(),
            Some(Duration::from_millis(500))
        );
    }

    #[test]
    fn container_action_parse() {
        assert_eq!("Start".parse::<ContainerAction>(), Ok(ContainerAction::Start));
        assert_eq!("stop".parse::<ContainerAction>(), Ok(ContainerAction::Stop));
        assert!("restart".parse::<ContainerAction>().is_err());
    }

    #[test]
    fn workflow_from_stored_row() {
        let stored = StoredWorkflow {
            id: "wf".into(),
            name: "Morning".into(),
            steps: json!([{"id": "a", "kind": "application", "payload": "code"}]),
            is_favorite: true,
            display_order: Some(0),
            created_at: 1,
            updated_at: 2,
        };
        let wf = Workflow::from_stored(stored).unwrap();
        assert_eq!(wf.steps, vec![CommandStep::application("a", "code")]);
        assert!(wf.is_favorite);
    }

    #[test]
    fn null_steps_decode_as_empty() {
        let stored = StoredWorkflow {
            id: "wf".into(),
            name: "n".into(),
            steps: serde_json::Value::Null,
            is_favorite: false,
            display_order: None,
            created_at: 0,
            updated_at: 0,
        };
        assert!(Workflow::from_stored(stored).unwrap().steps.is_empty());
    }

    #[test]
    fn bad_steps_keep_their_slot() {
        let stored = StoredWorkflow {
            id: "wf".into(),
            name: "n".into(),
            steps: json!([
                {"id": "a", "kind": "url", "payload": "https://a.example"},
                {"id": "b", "kind": "container", "container_id": "db", "action": "restart",
                 "delay_after_seconds": 1},
                {"id": "c", "kind": "teleport"},
                {"kind": "url", "payload": 7}
            ]),
            is_favorite: false,
            display_order: None,
            created_at: 0,
            updated_at: 0,
        };
        let wf = Workflow::from_stored(stored).unwrap();
        let ids: Vec<&str> = wf.steps.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "step-4"]);

        assert_eq!(wf.steps[0].kind, StepKind::Url);
        match &wf.steps[1].kind {
            StepKind::Invalid { reason, .. } => {
                assert_eq!(reason, "Unknown container action: restart");
            }
            other => panic!("expected invalid step, got {other:?}"),
        }
        assert_eq!(wf.steps[1].delay_after(), Some(Duration::from_secs(1)));
        match &wf.steps[2].kind {
            StepKind::Invalid { reason, .. } => assert_eq!(reason, "Unsupported step kind: teleport"),
            other => panic!("expected invalid step, got {other:?}"),
        }
        match &wf.steps[3].kind {
            StepKind::Invalid { reason, .. } => {
                assert!(reason.starts_with("Invalid step definition:"));
            }
            other => panic!("expected invalid step, got {other:?}"),
        }
    }

    #[test]
    fn invalid_steps_are_saved_back_verbatim() {
        let raw = json!({"id": "b", "kind": "container", "action": "restart"});
        let steps = vec![CommandStep::url("a", "https://a.example"), CommandStep::decode(1, raw.clone())];
        let saved = steps_to_json(&steps).unwrap();
        assert_eq!(saved[1], raw);
        assert_eq!(saved[0]["kind"], "url");
    }

    #[test]
    fn non_array_steps_rejected() {
        let stored = StoredWorkflow {
            id: "wf".into(),
            name: "n".into(),
            steps: json!({"id": "a"}),
            is_favorite: false,
            display_order: None,
            created_at: 0,
            updated_at: 0,
        };
        assert!(Workflow::from_stored(stored).is_err());
    }

    #[test]
    fn rejected_run_has_no_steps() {
        let run = RunResult::rejected("wf", "Workflow has no steps");
        assert!(!run.succeeded);
        assert!(run.steps.is_empty());
        assert_eq!(run.failed_steps().count(), 0);
    }
}
