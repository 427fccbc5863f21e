// ABOUTME: Colored status lines written into terminal sessions
// ABOUTME: Each line is a single text frame terminated with CRLF

use std::time::Duration;

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const RESET: &str = "\x1b[0m";

/// Prompt marker sent after the welcome line
pub const PROMPT: &str = "$ ";

fn line(color: &str, text: &str) -> String {
    format!("{}{}{}\r\n", color, text, RESET)
}

pub fn ready(workspace_id: &str) -> String {
    line(GREEN, &format!("Connected to workspace {}", workspace_id))
}

pub fn sandbox_missing(workspace_id: &str) -> String {
    line(
        RED,
        &format!(
            "Sandbox for workspace {} is not running. Start the workspace and reconnect.",
            workspace_id
        ),
    )
}

pub fn fatal(error: &str) -> String {
    line(RED, &format!("Terminal error: {}", error))
}

pub fn session_ended() -> String {
    line(YELLOW, "Session ended.")
}

pub fn idle_timeout(after: Duration) -> String {
    line(
        YELLOW,
        &format!("Session closed after {}s of inactivity.", after.as_secs()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_are_colored_and_terminated() {
        let ready = ready("ws-1");
        assert!(ready.starts_with(GREEN));
        assert!(ready.ends_with("\x1b[0m\r\n"));
        assert!(ready.contains("ws-1"));

        assert!(sandbox_missing("ws-1").starts_with(RED));
        assert!(fatal("boom").contains("boom"));
        assert!(session_ended().starts_with(YELLOW));
        assert!(idle_timeout(Duration::from_secs(90)).contains("90s"));
    }
}
