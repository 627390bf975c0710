//! Output formatting for grouped search results

use crate::engine::types::{KeyGroup, MatchRecord};
use crate::rewrite::FileResult;
use serde::Serialize;
use std::io::{self, Write};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Characters of context kept before the match
const CONTEXT_BEFORE: usize = 30;
/// Characters of context kept after the match
const CONTEXT_AFTER: usize = 100;
const ELLIPSIS: &str = "…";

/// A match line cut down to what gets displayed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snippet {
    pub before: String,
    pub matched: String,
    pub after: String,
}

impl Snippet {
    /// Cut `line` around the byte columns `start..end`.
    ///
    /// Leading whitespace is dropped; the context on each side is capped and
    /// marked with an ellipsis when truncated.
    pub fn new(line: &str, start: usize, end: usize) -> Self {
        let line = line.trim_end_matches(['\n', '\r']);
        let start = floor_boundary(line, start);
        let end = floor_boundary(line, end.max(start));

        let before = line[..start].trim_start();
        let before_len = before.chars().count();
        let before = if before_len > CONTEXT_BEFORE {
            let kept: String = before.chars().skip(before_len - CONTEXT_BEFORE).collect();
            format!("{}{}", ELLIPSIS, kept)
        } else {
            before.to_string()
        };

        let after = &line[end..];
        let after = if after.chars().count() > CONTEXT_AFTER {
            let kept: String = after.chars().take(CONTEXT_AFTER).collect();
            format!("{}{}", kept, ELLIPSIS)
        } else {
            after.to_string()
        };

        Self {
            before,
            matched: line[start..end].to_string(),
            after,
        }
    }

    pub fn for_record(record: &MatchRecord) -> Self {
        Self::new(
            &record.lines,
            record.range.start.column as usize,
            record.range.end.column as usize,
        )
    }
}

fn floor_boundary(s: &str, mut index: usize) -> usize {
    index = index.min(s.len());
    while !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn stdout(color: bool) -> StandardStream {
    let choice = if color {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    StandardStream::stdout(choice)
}

/// Print key groups: key header, then each file and its matches
pub fn print_groups(groups: &[KeyGroup], color: bool) -> io::Result<()> {
    let mut out = stdout(color);
    write_groups(&mut out, groups)
}

pub fn write_groups<W: WriteColor>(out: &mut W, groups: &[KeyGroup]) -> io::Result<()> {
    for (i, group) in groups.iter().enumerate() {
        if i > 0 {
            // Add blank line between keys
            writeln!(out)?;
        }

        // Key header
        out.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true))?;
        write!(out, "{}", group.lang.key)?;
        out.reset()?;
        writeln!(out, " {}", group.lang.value)?;

        for file in &group.files {
            out.set_color(ColorSpec::new().set_fg(Some(Color::Magenta)).set_bold(true))?;
            writeln!(out, "  {}", file.file)?;
            out.reset()?;

            for record in &file.matches {
                write_match_line(out, record)?;
            }
        }
    }

    Ok(())
}

/// Print a match line with highlighted match
fn write_match_line<W: WriteColor>(out: &mut W, record: &MatchRecord) -> io::Result<()> {
    // Print 1-based line and column
    write!(out, "    ")?;
    out.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
    write!(
        out,
        "{}:{}",
        record.range.start.line + 1,
        record.range.start.column + 1
    )?;
    out.reset()?;
    write!(out, ": ")?;

    let snippet = Snippet::for_record(record);
    write!(out, "{}", snippet.before)?;

    // The match itself (highlighted)
    out.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true))?;
    write!(out, "{}", snippet.matched)?;
    out.reset()?;

    if let Some(replacement) = &record.replacement {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true))?;
        write!(out, " → {}", replacement)?;
        out.reset()?;
    }

    writeln!(out, "{}", snippet.after)?;
    Ok(())
}

/// Print match count per key (for -c flag)
pub fn print_key_counts(groups: &[KeyGroup], color: bool) -> io::Result<()> {
    let mut out = stdout(color);

    for group in groups {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)))?;
        write!(out, "{}", group.lang.key)?;
        out.reset()?;
        write!(out, ":")?;
        out.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
        writeln!(out, "{}", group.match_count())?;
        out.reset()?;
    }

    Ok(())
}

/// Print dictionary keys with their translation
pub fn print_keys<'a>(
    entries: impl IntoIterator<Item = (&'a str, &'a str)>,
    color: bool,
) -> io::Result<()> {
    let mut out = stdout(color);

    for (key, value) in entries {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)))?;
        write!(out, "{}", key)?;
        out.reset()?;
        writeln!(out, "\t{}", value)?;
    }

    Ok(())
}

/// Print per-file replace outcomes. Returns how many files failed.
pub fn print_replace_results(results: &[FileResult], color: bool) -> io::Result<usize> {
    let mut out = stdout(color);
    let mut failures = 0;

    for (file, result) in results {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Magenta)))?;
        write!(out, "{}", file)?;
        out.reset()?;

        match result {
            Ok(outcome) => {
                write!(out, ": ")?;
                out.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
                write!(out, "{} replaced", outcome.applied)?;
                out.reset()?;
                if outcome.skipped > 0 {
                    write!(out, ", {} skipped", outcome.skipped)?;
                }
                writeln!(out)?;
            }
            Err(e) => {
                failures += 1;
                write!(out, ": ")?;
                out.set_color(ColorSpec::new().set_fg(Some(Color::Red)))?;
                writeln!(out, "{}", e)?;
                out.reset()?;
            }
        }
    }

    Ok(failures)
}

/// Write any serializable value as one line of JSON
pub fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
    let stdout = io::stdout();
    let mut lock = stdout.lock();
    serde_json::to_writer(&mut lock, value)?;
    writeln!(lock)?;
    Ok(())
}
