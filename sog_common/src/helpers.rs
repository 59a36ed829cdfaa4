use std::env;

/// Reads an on/off switch from the environment. Unset or unrecognised values give `default`.
pub fn env_flag(name: &str, default: bool) -> bool {
    env::var(name).ok().map(|v| parse_flag(&v, default)).unwrap_or(default)
}

pub fn parse_flag(value: &str, default: bool) -> bool {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn flags() {
        assert!(parse_flag("Yes", false));
        assert!(!parse_flag(" off ", true));
        assert!(parse_flag("maybe", true));
        assert!(!env_flag("SOG_TEST_FLAG_THAT_IS_NEVER_SET", false));
    }
}
