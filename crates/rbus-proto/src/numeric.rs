//! ---
//! rbus_section: "02-messaging-wire-format"
//! rbus_subsection: "module"
//! rbus_type: "source"
//! rbus_scope: "code"
//! rbus_description: "Frame codecs for the bus and host links."
//! rbus_version: "v0.1.0"
//! rbus_owner: "tbd"
//! ---
//! Tolerant field parsers. A field that fails to parse yields `None` and
//! leaves the rest of the frame usable.

/// Parse an ADC count. Integer text is preferred; a finite decimal within
/// range is rounded.
pub fn parse_adc(text: &str) -> Option<u16> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(value) = text.parse::<u16>() {
        return Some(value);
    }
    let value = parse_float(text)?;
    if (0.0..=f32::from(u16::MAX)).contains(&value) {
        Some(value.round() as u16)
    } else {
        None
    }
}

/// Parse a finite floating point value.
pub fn parse_float(text: &str) -> Option<f32> {
    text.trim()
        .parse::<f32>()
        .ok()
        .filter(|value| value.is_finite())
}

/// Parse a boolean flag (`true`/`false`, `1`/`0`, `on`/`off`).
pub fn parse_bool(text: &str) -> Option<bool> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("true") || text == "1" || text.eq_ignore_ascii_case("on") {
        Some(true)
    } else if text.eq_ignore_ascii_case("false")
        || text == "0"
        || text.eq_ignore_ascii_case("off")
    {
        Some(false)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adc_counts_parse_tolerantly() {
        assert_eq!(parse_adc("1500"), Some(1500));
        assert_eq!(parse_adc(" 2000 "), Some(2000));
        assert_eq!(parse_adc("2499.6"), Some(2500));
        assert_eq!(parse_adc(""), None);
        assert_eq!(parse_adc("abc"), None);
        assert_eq!(parse_adc("-4"), None);
        assert_eq!(parse_adc("70000"), None);
        assert_eq!(parse_adc("NaN"), None);
    }

    #[test]
    fn booleans_accept_common_spellings() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("ON"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("False"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
