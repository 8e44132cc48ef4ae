//! AppleScript sources used to drive the document application.
//!
//! Centralising every script here serves two purposes:
//!
//! 1. **Single source of truth** — the reply protocol (`SUCCESS` /
//!    `ERROR <num>: <msg>`) is produced here and parsed in
//!    [`crate::pipeline::oracle`]; keeping the producer in one place makes the
//!    pair easy to keep in step.
//!
//! 2. **Testability** — unit tests can inspect the generated scripts without
//!    running `osascript`, so quoting regressions are caught on any platform.

use std::path::Path;

/// Reply sent by the conversion script when export finished without error.
pub const SUCCESS_REPLY: &str = "SUCCESS";

/// Escape a string for embedding inside an AppleScript string literal.
///
/// Only backslash and double quote are special inside AppleScript literals.
/// Backslashes are doubled first so the quote escapes are not doubled again.
pub fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn escape_path(path: &Path) -> String {
    escape(&path.to_string_lossy())
}

/// Build the open/export/close script for one document.
///
/// The document is closed without saving so the source is never modified.
/// Errors inside the `tell` block are caught and returned as an
/// `ERROR <num>: <msg>` reply instead of a non-zero exit, which lets the
/// adapter report the application's own error number.
pub fn convert_script(
    application: &str,
    source: &Path,
    target: &Path,
    export_format: &str,
    open_delay_secs: u64,
) -> String {
    format!(
        r#"tell application "{app}"
    try
        set theDoc to open POSIX file "{source}"
        delay {delay}
        export theDoc to POSIX file "{target}" as {format}
        close theDoc saving no
        return "{ok}"
    on error errMsg number errNum
        return "ERROR " & errNum & ": " & errMsg
    end try
end tell"#,
        app = escape(application),
        source = escape_path(source),
        target = escape_path(target),
        delay = open_delay_secs,
        format = export_format,
        ok = SUCCESS_REPLY,
    )
}

/// Ask the application to quit.
pub fn quit_script(application: &str) -> String {
    format!(r#"tell application "{}" to quit"#, escape(application))
}

/// Launch the application (or bring it to the front if already running).
pub fn activate_script(application: &str) -> String {
    format!(r#"tell application "{}" to activate"#, escape(application))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_quotes_and_backslashes() {
        assert_eq!(escape(r#"a "b" c"#), r#"a \"b\" c"#);
        assert_eq!(escape(r"a\b"), r"a\\b");
        assert_eq!(escape(r#"\""#), r#"\\\""#);
        assert_eq!(escape("plain name"), "plain name");
    }

    #[test]
    fn convert_script_embeds_escaped_paths() {
        let script = convert_script(
            "Pages",
            Path::new(r#"/Users/me/My "quoted" doc.pages"#),
            Path::new(r#"/Users/me/My "quoted" doc.docx"#),
            "Microsoft Word",
            1,
        );
        assert!(script.contains(r#"open POSIX file "/Users/me/My \"quoted\" doc.pages""#));
        assert!(script.contains(r#"POSIX file "/Users/me/My \"quoted\" doc.docx" as Microsoft Word"#));
        assert!(script.contains("close theDoc saving no"));
        assert!(script.contains("delay 1"));
        assert!(script.starts_with(r#"tell application "Pages""#));
    }

    #[test]
    fn lifecycle_scripts() {
        assert_eq!(quit_script("Pages"), r#"tell application "Pages" to quit"#);
        assert_eq!(
            activate_script("Pages"),
            r#"tell application "Pages" to activate"#
        );
    }
}
