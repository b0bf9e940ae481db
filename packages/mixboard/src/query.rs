//! Field extraction for event lines.
//!
//! Event lines look like `NAME KEY="value" KEY=value` or carry comma-joined
//! pairs (`KEY="a",KEY2="b"`). Quoted values run until the next `" ` (or the
//! closing quote); unquoted values run until the next comma.

/// Find `key` in `line` and return its raw value.
pub fn extract<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let rest = value_start(line, key)?;
    match rest.strip_prefix('"') {
        Some(quoted) => match quoted.find("\" ") {
            Some(end) => Some(&quoted[..end]),
            None => quoted.split('"').next(),
        },
        None => rest.split(',').next(),
    }
}

/// Slice of `line` right after `key=`. A key at line start or after a space
/// wins over one after a comma, so `VALUE="x,TYPE=A" TYPE=B` yields `B`.
fn value_start<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let needle = format!("{key}=");
    let at = key_position(line, &needle, b' ').or_else(|| key_position(line, &needle, b','))?;
    Some(&line[at + needle.len()..])
}

/// First index of `needle` at line start or right after `separator`.
fn key_position(line: &str, needle: &str, separator: u8) -> Option<usize> {
    let mut from = 0;
    while let Some(pos) = line[from..].find(needle) {
        let at = from + pos;
        if at == 0 || line.as_bytes()[at - 1] == separator {
            return Some(at);
        }
        from = at + needle.len();
    }
    None
}

/// Parse the leading decimal digits of a field value. Trailing text is
/// ignored (`"2 TYPE=X"` parses as 2).
pub fn parse_id(value: &str) -> Option<u32> {
    let value = value.trim_start();
    let end = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    value[..end].parse().ok()
}

/// `true` when the value reads `true` in any letter case.
pub fn parse_flag(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comma_joined_quoted_pairs() {
        let line = r#"CHANNEL="CH_0",KEYERID="2""#;
        assert_eq!(extract(line, "KEYERID"), Some("2"));
        assert_eq!(extract(line, "CHANNEL"), Some("CH_0"));
    }

    #[test]
    fn space_separated_event_fields() {
        let line = r#"PROGRAM_CHANGED CHANNEL="CH_0" VIDEOINPUTID=2"#;
        assert_eq!(extract(line, "CHANNEL"), Some("CH_0"));
        assert_eq!(extract(line, "VIDEOINPUTID"), Some("2"));
    }

    #[test]
    fn quoted_value_keeps_spaces_and_commas() {
        let line = r#"VIDEOINPUTEVENT VIDEOINPUTID=1 VALUE="Cam 1, left" TYPE="NAME_CHANGED""#;
        assert_eq!(extract(line, "VALUE"), Some("Cam 1, left"));
        assert_eq!(extract(line, "TYPE"), Some("NAME_CHANGED"));
    }

    #[test]
    fn unquoted_value_runs_to_comma_not_space() {
        let line = "X A=1 B=2,C=3";
        assert_eq!(extract(line, "A"), Some("1 B=2"));
        assert_eq!(extract(line, "B"), Some("2"));
        assert_eq!(extract(line, "C"), Some("3"));
    }

    #[test]
    fn space_boundary_beats_comma_inside_quotes() {
        let line = r#"VIDEOINPUTEVENT VIDEOINPUTID=1 VALUE="x,TYPE=NAME_CHANGED" TYPE=SIGNAL"#;
        assert_eq!(extract(line, "TYPE"), Some("SIGNAL"));
        assert_eq!(extract(line, "VALUE"), Some("x,TYPE=NAME_CHANGED"));
    }

    #[test]
    fn key_must_sit_on_a_boundary() {
        let line = "KEYER_STATUS_CHANGED KEYERID=3 STATUS=STOP";
        assert_eq!(extract(line, "ID"), None);
        assert_eq!(extract(line, "STATUS"), Some("STOP"));
    }

    #[test]
    fn missing_key() {
        assert_eq!(extract("PING", "CHANNEL"), None);
        assert_eq!(extract("", "CHANNEL"), None);
    }

    #[test]
    fn unterminated_quote_returns_remainder() {
        assert_eq!(extract(r#"E NAME="abc"#, "NAME"), Some("abc"));
    }

    #[test]
    fn leading_digit_parse() {
        assert_eq!(parse_id("2"), Some(2));
        assert_eq!(parse_id(" 12abc"), Some(12));
        assert_eq!(parse_id("2 TYPE=NAME_CHANGED"), Some(2));
        assert_eq!(parse_id("abc"), None);
        assert_eq!(parse_id("-1"), None);
        assert_eq!(parse_id(""), None);
    }

    #[test]
    fn flags() {
        assert!(parse_flag("true"));
        assert!(parse_flag("TRUE"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag("1"));
    }
}
