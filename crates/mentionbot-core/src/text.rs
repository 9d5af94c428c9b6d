//! Small string helpers used by the command pipeline and modules.

use std::borrow::Cow;

/// Hard ceiling on the length of one outbound message, in characters.
pub const MESSAGE_LIMIT: usize = 2000;

/// Appended to messages cut down to [`MESSAGE_LIMIT`].
pub const TRUNCATION_SUFFIX: &str = "\nSorry m8, can't send more than 2000 characters.";

/// Splits off the first whitespace-delimited word.
///
/// Leading whitespace is ignored and the remainder has its leading whitespace
/// stripped. Trailing whitespace in the remainder is kept verbatim.
///
/// ```text
/// "hi    how   r u" -> ("hi", "how   r u")
/// "hi"              -> ("hi", "")
/// "   "             -> ("", "")
/// ```
pub fn split_left_word(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.find(char::is_whitespace) {
        Some(idx) => (&text[..idx], text[idx..].trim_start()),
        None => (text, ""),
    }
}

/// Splits off the last whitespace-delimited word.
///
/// Mirror image of [`split_left_word`]: a single word ends up on the right.
///
/// ```text
/// "some user Admin" -> ("some user", "Admin")
/// "Admin"           -> ("", "Admin")
/// ```
pub fn split_right_word(text: &str) -> (&str, &str) {
    let text = text.trim_end();
    match text.rfind(char::is_whitespace) {
        Some(idx) => (text[..idx].trim_end(), text[idx..].trim_start()),
        None => ("", text),
    }
}

/// Drops every whitespace character.
pub fn remove_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Cuts `content` down to [`MESSAGE_LIMIT`] characters, appending
/// [`TRUNCATION_SUFFIX`] when anything was removed.
pub fn truncate_message(content: &str) -> Cow<'_, str> {
    if content.chars().count() <= MESSAGE_LIMIT {
        return Cow::Borrowed(content);
    }
    let keep = MESSAGE_LIMIT - TRUNCATION_SUFFIX.chars().count();
    let mut out: String = content.chars().take(keep).collect();
    out.push_str(TRUNCATION_SUFFIX);
    Cow::Owned(out)
}

/// Extracts the ID from `<@id>` or `<@!id>`.
pub fn parse_user_mention(text: &str) -> Option<&str> {
    let inner = text.strip_prefix("<@")?.strip_suffix('>')?;
    let inner = inner.strip_prefix('!').unwrap_or(inner);
    is_all_digits(inner).then_some(inner)
}

/// Extracts the ID from `<#id>`.
pub fn parse_channel_mention(text: &str) -> Option<&str> {
    let inner = text.strip_prefix("<#")?.strip_suffix('>')?;
    is_all_digits(inner).then_some(inner)
}

/// Non-empty and made of ASCII digits only.
pub fn is_all_digits(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

/// Formats a number of seconds as days/hours/minutes/seconds, skipping
/// leading zero units.
pub fn format_duration(total_secs: u64) -> String {
    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    let seconds = total_secs % 60;

    let units = [
        (days, "day"),
        (hours, "hour"),
        (minutes, "minute"),
        (seconds, "second"),
    ];
    let parts: Vec<String> = units
        .iter()
        .skip_while(|(n, _)| *n == 0)
        .map(|(n, unit)| {
            let plural = if *n == 1 { "" } else { "s" };
            format!("{n} {unit}{plural}")
        })
        .collect();

    if parts.is_empty() {
        "0 seconds".to_string()
    } else {
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_left_word() {
        assert_eq!(split_left_word("hi    how   r u"), ("hi", "how   r u"));
        assert_eq!(split_left_word("hi"), ("hi", ""));
        assert_eq!(split_left_word("  lead trail  "), ("lead", "trail  "));
        assert_eq!(split_left_word(""), ("", ""));
        assert_eq!(split_left_word("   "), ("", ""));
    }

    #[test]
    fn test_split_right_word() {
        assert_eq!(split_right_word("some user Admin"), ("some user", "Admin"));
        assert_eq!(split_right_word("Admin  "), ("", "Admin"));
        assert_eq!(split_right_word(""), ("", ""));
    }

    #[test]
    fn test_truncate_message() {
        let short = "a".repeat(MESSAGE_LIMIT);
        assert!(matches!(truncate_message(&short), Cow::Borrowed(_)));

        let long = "a".repeat(MESSAGE_LIMIT + 1);
        let cut = truncate_message(&long);
        assert_eq!(cut.chars().count(), MESSAGE_LIMIT);
        assert!(cut.ends_with(TRUNCATION_SUFFIX));
    }

    #[test]
    fn test_mentions() {
        assert_eq!(parse_user_mention("<@123>"), Some("123"));
        assert_eq!(parse_user_mention("<@!123>"), Some("123"));
        assert_eq!(parse_user_mention("<@abc>"), None);
        assert_eq!(parse_channel_mention("<#42>"), Some("42"));
        assert_eq!(parse_channel_mention("#42"), None);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0 seconds");
        assert_eq!(format_duration(61), "1 minute, 1 second");
        assert_eq!(format_duration(90_061), "1 day, 1 hour, 1 minute, 1 second");
    }
}
