//! Block-list filtering and hosts-file rendering.
//!
//! Only two line shapes are recognized in a source payload:
//!
//! ```text
//! 0.0.0.0 ads.example.com
//! 127.0.0.1 tracker.example.com
//! ```
//!
//! Everything else (comments, blanks, IPv6 entries, plain domains) is
//! dropped.

use chrono::NaiveDateTime;

/// First line of every generated hosts file.
pub const GENERATOR_HEADER: &str = "# AdBlock Hosts";

/// Loopback entries written ahead of the block lines.
pub const LOOPBACK_LINES: [&str; 2] = ["127.0.0.1 localhost", "::1 localhost"];

const BLOCK_PREFIXES: [&str; 2] = ["0.0.0.0 ", "127.0.0.1 "];

/// Returns `true` if `line` (already trimmed) is a block entry.
#[must_use]
pub fn is_block_line(line: &str) -> bool {
    !line.starts_with('#') && BLOCK_PREFIXES.iter().any(|p| line.starts_with(p))
}

/// Extracts the block entries from a source payload, trimmed, in source order.
#[must_use]
pub fn filter(payload: &str) -> Vec<String> {
    payload
        .lines()
        .map(str::trim)
        .filter(|line| is_block_line(line))
        .map(str::to_string)
        .collect()
}

/// Builds the hosts file for `lines`.
///
/// ```text
/// # AdBlock Hosts
/// # Generated: 2024-01-02 03:04:05
///
/// 127.0.0.1 localhost
/// ::1 localhost
///
/// 0.0.0.0 ads.example.com
/// ```
///
/// The output depends only on `lines` and `generated_at`.
#[must_use]
pub fn render(lines: &[String], generated_at: NaiveDateTime) -> String {
    format!(
        "{GENERATOR_HEADER}\n# Generated: {ts}\n\n{lo4}\n{lo6}\n\n{body}",
        ts = generated_at.format("%Y-%m-%d %H:%M:%S"),
        lo4 = LOOPBACK_LINES[0],
        lo6 = LOOPBACK_LINES[1],
        body = lines.join("\n"),
    )
}

/// Returns the block entries of an installed hosts file.
///
/// For files produced by [`render`] the fixed loopback preamble is skipped,
/// so `entries(render(l)) == l`. Files from anywhere else are scanned in
/// full.
#[must_use]
pub fn entries(artifact: &str) -> Vec<&str> {
    body(artifact)
        .lines()
        .map(str::trim)
        .filter(|line| is_block_line(line))
        .collect()
}

/// Number of block entries in an installed hosts file. See [`entries`].
#[must_use]
pub fn count(artifact: &str) -> usize {
    body(artifact)
        .lines()
        .filter(|line| is_block_line(line.trim()))
        .count()
}

fn body(artifact: &str) -> &str {
    if !artifact.starts_with(GENERATOR_HEADER) {
        return artifact;
    }
    let preamble_end = format!("\n{}\n", LOOPBACK_LINES[1]);
    artifact
        .find(&preamble_end)
        .map_or(artifact, |pos| &artifact[pos + preamble_end.len()..])
}
