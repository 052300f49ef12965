//! Shared helper functions used across CLI subcommands.
//!
//! Includes tracing initialization, URL normalization, and output
//! formatting.

use tracing_subscriber::EnvFilter;

use flowdeck_engine::{CommandStep, StepKind};

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Initialize the tracing subscriber with the given default log level.
/// `RUST_LOG`, when set, wins.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

// ---------------------------------------------------------------------------
// URLs
// ---------------------------------------------------------------------------

/// Prefix `https://` when `input` has no scheme, then validate it.
pub fn normalize_url(input: &str) -> Result<String, url::ParseError> {
    let trimmed = input.trim();
    let candidate = if trimmed.contains("://") || trimmed.starts_with("mailto:") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    Ok(url::Url::parse(&candidate)?.to_string())
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

/// `3725` -> `1h 2m 5s`.
pub fn format_seconds(total: i64) -> String {
    let total = total.max(0);
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    match (h, m) {
        (0, 0) => format!("{s}s"),
        (0, _) => format!("{m}m {s}s"),
        _ => format!("{h}h {m}m {s}s"),
    }
}

/// One-line description of a step for listings.
pub fn describe_step(step: &CommandStep) -> String {
    if let Some(desc) = &step.description {
        return desc.clone();
    }
    match &step.kind {
        StepKind::Application => format!("open {}", step.payload),
        StepKind::TerminalCommand {
            commands,
            run_in_own_terminal_window,
        } => {
            let lines = if commands.is_empty() {
                step.payload.clone()
            } else {
                commands.join(" && ")
            };
            if *run_in_own_terminal_window {
                format!("terminal window: {lines}")
            } else {
                format!("$ {lines}")
            }
        }
        StepKind::Url => format!("browse {}", step.payload),
        StepKind::Container {
            container_id,
            action,
        } => format!(
            "container {} {}",
            action.map(|a| a.to_string()).unwrap_or_else(|| "?".into()),
            container_id.as_deref().unwrap_or("?")
        ),
        StepKind::Invalid { reason, .. } => format!("unusable step: {reason}"),
    }
}
