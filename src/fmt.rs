//! Human-friendly CLI output formatters.
//!
//! Each `fmt_*` function formats one operation's result for terminal
//! display, styling the result types' own Markdown renderings. When
//! `color` is true, ANSI escape codes are emitted via `owo_colors`.

use crate::error::Error;
use crate::results::{
    ContentQueryResult, DetectionsResult, InventoryQueryResult, ProcessorsSurveyResult,
};
use owo_colors::OwoColorize;
use std::io::{self, Write};

/// Styles one Markdown line for the terminal.
fn write_line(w: &mut impl Write, line: &str, color: bool) -> io::Result<()> {
    if !color {
        return writeln!(w, "{line}");
    }
    if let Some(heading) = line.strip_prefix("# ") {
        writeln!(w, "{}", heading.bold())
    } else if let Some(heading) = line.strip_prefix("## ") {
        writeln!(w, "{}", heading.bold().underline())
    } else if line.starts_with("> warning:") {
        writeln!(w, "{}", line.yellow())
    } else if line.starts_with('>') {
        writeln!(w, "{}", line.dimmed())
    } else {
        writeln!(w, "{line}")
    }
}

fn write_lines(w: &mut impl Write, lines: &[String], color: bool) -> io::Result<()> {
    for line in lines {
        write_line(w, line, color)?;
    }
    Ok(())
}

// ── detect ──────────────────────────────────────────────────────────────────

pub fn fmt_detections(
    w: &mut impl Write,
    out: &DetectionsResult,
    color: bool,
    reveal_internals: bool,
) -> io::Result<()> {
    write_lines(w, &out.render_as_markdown(reveal_internals), color)
}

// ── inventory query / summarize ─────────────────────────────────────────────

pub fn fmt_inventory(
    w: &mut impl Write,
    out: &InventoryQueryResult,
    color: bool,
    reveal_internals: bool,
) -> io::Result<()> {
    write_lines(w, &out.render_as_markdown(reveal_internals), color)?;
    if out.search_metadata.results_truncated() {
        if color {
            writeln!(w, "{}", "... more matches available".dimmed())?;
        } else {
            writeln!(w, "... more matches available")?;
        }
    }
    Ok(())
}

// ── content query ───────────────────────────────────────────────────────────

pub fn fmt_content(
    w: &mut impl Write,
    out: &ContentQueryResult,
    color: bool,
    reveal_internals: bool,
) -> io::Result<()> {
    write_lines(w, &out.render_as_markdown(reveal_internals), color)
}

// ── processor survey ────────────────────────────────────────────────────────

pub fn fmt_survey(
    w: &mut impl Write,
    out: &ProcessorsSurveyResult,
    color: bool,
) -> io::Result<()> {
    write_lines(w, &out.render_as_markdown(false), color)
}

// ── errors ──────────────────────────────────────────────────────────────────

pub fn fmt_error(w: &mut impl Write, err: &Error, color: bool) -> io::Result<()> {
    for line in err.render_as_markdown() {
        if color && line.starts_with("## ") {
            writeln!(w, "{}", line.trim_start_matches("## ").red().bold())?;
        } else {
            writeln!(w, "{line}")?;
        }
    }
    Ok(())
}
