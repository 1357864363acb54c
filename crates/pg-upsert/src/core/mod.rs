//! Shared building blocks: identifier handling and small text utilities.

pub mod identifier;

use std::time::Duration;

/// Render headers and rows as a github-style markdown table.
///
/// Column widths are sized to the widest cell. Used for the control-table
/// snapshot and for row samples shown through the terminal prompter.
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() && cell.len() > widths[i] {
                widths[i] = cell.len();
            }
        }
    }

    let mut out = String::new();
    out.push('|');
    for (h, w) in headers.iter().zip(&widths) {
        out.push_str(&format!(" {:<width$} |", h, width = w));
    }
    out.push('\n');
    out.push('|');
    for w in &widths {
        out.push_str(&format!("{}|", "-".repeat(w + 2)));
    }
    for row in rows {
        out.push('\n');
        out.push('|');
        for (i, w) in widths.iter().enumerate() {
            let cell = row.get(i).map(String::as_str).unwrap_or("");
            out.push_str(&format!(" {:<width$} |", cell, width = w));
        }
    }
    out
}

/// Format a duration for log output: seconds below a minute, then
/// minutes/seconds, then hours/minutes/seconds.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    if secs < 60.0 {
        format!("{:.3} seconds", secs)
    } else if secs < 3600.0 {
        format!("{} minutes, {:.3} seconds", (secs / 60.0) as u64, secs % 60.0)
    } else {
        format!(
            "{} hours, {} minutes, {:.3} seconds",
            (secs / 3600.0) as u64,
            ((secs % 3600.0) / 60.0) as u64,
            secs % 60.0
        )
    }
}
