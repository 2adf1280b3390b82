/// GitHub access token. Never printed in logs or debug output.
pub struct Token(String);

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl Token {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<redacted>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_from_str() {
        let token = Token::from("ghp_1234567890abcdef");
        assert_eq!(token.as_str(), "ghp_1234567890abcdef");
    }

    #[test]
    fn test_token_debug_is_redacted() {
        let token = Token::from("ghp_secret");
        let debug = format!("{token:?}");
        assert_eq!(debug, "<redacted>");
        assert!(!debug.contains("secret"));
    }
}
