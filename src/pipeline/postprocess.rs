//! Post-processing: deterministic cleanup of generated summary text.
//!
//! Models asked for a plain summary still sometimes wrap it in a
//! ` ```markdown ` fence, open with their own `# Summary` heading, or invent
//! `![figure](figure1.png)` links to images that do not exist. Each of these
//! would break the post: a stray `##` heading adds a fourth tab to the
//! tabbed layout, a fake image link renders as a broken picture.
//!
//! Rules (applied in order):
//! 1. Strip outer markdown fences
//! 2. Normalise line endings (CRLF → LF)
//! 3. Trim trailing whitespace per line
//! 4. Collapse runs of blank lines into one
//! 5. Demote `#` and `##` headings to `###`
//! 6. Replace image links with their alt text in italics
//! 7. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens, …)
//! 8. Trim surrounding whitespace

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply every cleanup rule to a generated summary or translation.
pub fn clean_summary(input: &str) -> String {
    let s = strip_markdown_fences(input);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = demote_headings(&s);
    let s = replace_image_links(&s);
    let s = remove_invisible_chars(&s);
    s.trim().to_string()
}

// ── Rule 1: Strip outer markdown fences ──────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```(?:markdown|md|text)?\r?\n(.*)\r?\n```$").expect("valid regex")
});

fn strip_markdown_fences(input: &str) -> String {
    match RE_OUTER_FENCES.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Collapse blank-line runs ─────────────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").into_owned()
}

// ── Rule 5: Demote top-level headings ────────────────────────────────────────
//
// The post owns the `##` level: one section per tier.

static RE_TOP_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^#{1,2}[ \t]+").expect("valid regex"));

fn demote_headings(input: &str) -> String {
    RE_TOP_HEADING.replace_all(input, "### ").into_owned()
}

// ── Rule 6: Replace image links ──────────────────────────────────────────────
//
// The only images in a post are the figures the pipeline selected and
// persisted itself; anything the model wrote is invented.

static RE_IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\(([^)]*)\)").expect("valid regex"));

fn replace_image_links(input: &str) -> String {
    RE_IMAGE
        .replace_all(input, |caps: &regex::Captures<'_>| {
            let alt = caps[1].trim();
            if alt.is_empty() {
                String::new()
            } else {
                format!("*{}*", alt)
            }
        })
        .into_owned()
}

// ── Rule 7: Remove invisible Unicode characters ──────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}
