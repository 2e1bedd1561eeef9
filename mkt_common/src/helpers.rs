use std::{fmt::Display, str::FromStr};

/// Parse a boolean flag from a string value, or return the given default value otherwise.
pub fn parse_boolean_flag(value: Option<String>, default: bool) -> bool {
    let value = match value {
        Some(v) => v,
        None => return default,
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

/// Parse a numeric (or any `FromStr`) setting. Missing values yield the default; unparseable values yield the error
/// message so the caller can decide how loudly to complain.
pub fn parse_setting<T>(value: Option<String>, default: T) -> Result<T, String>
where
    T: FromStr,
    T::Err: Display,
{
    match value {
        None => Ok(default),
        Some(v) => v.trim().parse::<T>().map_err(|e| format!("'{v}' is not a valid value. {e}")),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn boolean_flags() {
        assert!(parse_boolean_flag(Some("YES".into()), false));
        assert!(!parse_boolean_flag(Some(" off ".into()), true));
        assert!(parse_boolean_flag(Some("maybe".into()), true));
        assert!(!parse_boolean_flag(None, false));
    }

    #[test]
    fn settings() {
        assert_eq!(parse_setting::<u32>(None, 5), Ok(5));
        assert_eq!(parse_setting::<u32>(Some(" 12 ".into()), 5), Ok(12));
        assert!(parse_setting::<u32>(Some("twelve".into()), 5).is_err());
    }
}
