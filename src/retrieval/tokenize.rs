/// Lowercase and split on anything that is not a letter or digit.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("When does the Rocket launch? March-15!"),
            vec!["when", "does", "the", "rocket", "launch", "march", "15"]
        );
        assert_eq!(tokenize("Ça décolle"), vec!["ça", "décolle"]);
        assert!(tokenize(" ... ").is_empty());
    }
}
