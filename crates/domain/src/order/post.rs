//! Post body formatting with the advertising disclosure block.

use std::sync::LazyLock;

use regex::{NoExpand, Regex};

use super::Erid;

/// Disclosure word placed above the identifier line.
pub const DISCLOSURE_LABEL: &str = "Реклама";

/// Marker preceding the identifier on its line.
pub const ERID_MARKER: &str = "ERID:";

/// An existing `ERID: <value>` on a single line. The marker must start a
/// word and the value is ASCII only.
static ERID_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bERID:[ \t]*[A-Za-z0-9_-]+").expect("ERID line pattern is valid")
});

/// Formats the published post body for `text` carrying `erid`.
///
/// Produces `"Реклама\nERID: {erid}\n\n{text}"`. When `text` already has an
/// `ERID:` marker, only its value is replaced on that line so repeated
/// formatting never stacks disclosure blocks.
pub fn format_post_body(text: &str, erid: &Erid) -> String {
    let line = format!("{ERID_MARKER} {erid}");
    if ERID_LINE.is_match(text) {
        return ERID_LINE.replace(text, NoExpand(&line)).into_owned();
    }
    format!("{DISCLOSURE_LABEL}\n{line}\n\n{text}")
}
