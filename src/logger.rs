//! Logging utilities with colored output.
//!
//! Provides the `log!` macro for formatted terminal output with a colored
//! module prefix. Every request handled by the server logs through here, so
//! messages are truncated to the terminal width to keep one line per event.
//!
//! # Example
//!
//! ```ignore
//! log!("serve"; "GET {}", url);
//! log!("denied"; "{}", path.display());
//! ```

use colored::{ColoredString, Colorize};
use crossterm::{
    execute,
    terminal::{Clear, ClearType, size},
};
use std::{
    borrow::Cow,
    io::{Write, stdout},
    sync::OnceLock,
};

/// Columns available for one log line, read once.
static TERMINAL_WIDTH: OnceLock<usize> = OnceLock::new();

/// Used when stdout is not a terminal.
const FALLBACK_WIDTH: usize = 120;

fn terminal_width() -> usize {
    *TERMINAL_WIDTH.get_or_init(|| size().map_or(FALLBACK_WIDTH, |(cols, _)| cols as usize))
}

// ============================================================================
// Log Macro
// ============================================================================

/// Log a message with a colored module prefix.
///
/// # Usage
/// ```ignore
/// log!("module"; "message with {} formatting", args);
/// ```
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Log a message with a colored module prefix.
///
/// Multi-line messages (bundler stderr, render errors) are printed as-is;
/// single lines are cut to the terminal width.
pub fn log(module: &str, message: &str) {
    let prefix = colorize_prefix(module, &module.to_ascii_lowercase());
    // "[module] "
    let room = terminal_width().saturating_sub(module.chars().count() + 3);
    let message = fit_line(message, room);

    let mut stdout = stdout().lock();
    execute!(stdout, Clear(ClearType::UntilNewLine)).ok();
    writeln!(stdout, "{prefix} {message}").ok();
    stdout.flush().ok();
}

/// Apply color to a module prefix based on module type.
#[inline]
fn colorize_prefix(module: &str, module_lower: &str) -> ColoredString {
    let prefix = format!("[{module}]");
    match module_lower {
        "serve" => prefix.bright_blue().bold(),
        "render" => prefix.bright_green().bold(),
        "error" | "denied" => prefix.bright_red().bold(),
        _ => prefix.bright_yellow().bold(),
    }
}

/// Cut a single-line `message` to `room` columns, marking the cut with `…`.
fn fit_line(message: &str, room: usize) -> Cow<'_, str> {
    if message.contains('\n') || message.chars().count() <= room {
        return Cow::Borrowed(message);
    }
    let kept: String = message.chars().take(room.saturating_sub(1)).collect();
    Cow::Owned(if room == 0 { kept } else { kept + "…" })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_line_keeps_short_lines() {
        assert_eq!(fit_line("--> /about.html", 40), "--> /about.html");
        assert_eq!(fit_line("--> /a", 6), "--> /a");
    }

    #[test]
    fn test_fit_line_marks_cut() {
        assert_eq!(fit_line("--> /posts/2024/hello.html", 10), "--> /post…");
        assert_eq!(fit_line("--> /a", 0), "");
    }

    #[test]
    fn test_fit_line_counts_chars() {
        assert_eq!(fit_line("--> /über/straße.html", 9), "--> /übe…");
    }

    #[test]
    fn test_multiline_messages_are_untouched() {
        let diagnostics = "app.js:1 unexpected token\n  at line 1";
        assert_eq!(fit_line(diagnostics, 5), diagnostics);
    }
}
