//! Map a single line from the auth backend onto a [`Classification`].

use super::Classification;

const SEND_USER: &str = "Send now username to check process.";
pub(crate) const MAILBOX_FOUND: &str = "Mailbox found.";
pub(crate) const TEMPORARILY_UNDELIVERABLE: &str =
    "Temporarily undeliverable: internal communication broken";
pub(crate) const MAILBOX_NOT_FOUND: &str = "Mailbox not found.";

/// Classify one line as received, newline included.
///
/// Verbs match case-insensitively on the start of the line. A line without
/// its trailing `\n` never matches anything, so a truncated reply reads as
/// "not found" exactly like an unexpected one.
#[must_use]
pub fn classify(line: &str) -> Classification {
    let Some(line) = line.strip_suffix('\n') else {
        return Classification::Unclassified(MAILBOX_NOT_FOUND);
    };

    if is_version_banner(line) {
        Classification::Continue(SEND_USER)
    } else if starts_with_ignore_case(line, "USER\t1") {
        Classification::Verified(MAILBOX_FOUND)
    } else if starts_with_ignore_case(line, "FAIL\t1") {
        Classification::TemporarilyUnavailable(TEMPORARILY_UNDELIVERABLE)
    } else {
        Classification::Unclassified(MAILBOX_NOT_FOUND)
    }
}

/// `VERSION\t<digits>\t...`
fn is_version_banner(line: &str) -> bool {
    let Some(rest) = strip_prefix_ignore_case(line, "VERSION\t") else {
        return false;
    };

    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    digits > 0 && rest.as_bytes().get(digits) == Some(&b'\t')
}

pub(super) fn starts_with_ignore_case(line: &str, prefix: &str) -> bool {
    strip_prefix_ignore_case(line, prefix).is_some()
}

fn strip_prefix_ignore_case<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let head = line.as_bytes().get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix.as_bytes())
        .then(|| &line[prefix.len()..])
}
