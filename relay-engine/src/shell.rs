//! POSIX shell quoting

/// Whether a command-line token must be quoted to survive the shell
///
/// Empty tokens, whitespace and the characters `| & ; ( ) < > ' " $ @` need quoting.
pub fn needs_quoting(token: &str) -> bool {
    token.is_empty()
        || token.chars().any(|c| {
            c.is_whitespace()
                || matches!(
                    c,
                    '|' | '&' | ';' | '(' | ')' | '<' | '>' | '\'' | '"' | '$' | '@'
                )
        })
}

/// Quotes a string so a POSIX shell reads it back as a single word
///
/// Strings made only of safe characters are returned unchanged.
pub fn quote(s: &str) -> String {
    if s.is_empty() {
        return "''".to_string();
    }
    if s.chars().all(is_safe) {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', r#"'"'"'"#))
}

fn is_safe(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '@' | '%' | '+' | '=' | ':' | ',' | '.' | '/' | '-')
}

/// Joins tokens with single spaces, quoting those that need it
pub fn join_quoted<S: AsRef<str>>(tokens: &[S]) -> String {
    tokens
        .iter()
        .map(|t| {
            let t = t.as_ref();
            if needs_quoting(t) { quote(t) } else { t.to_string() }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    #[test]
    fn test_needs_quoting() {
        assert!(needs_quoting(""));
        assert!(needs_quoting("a b"));
        assert!(needs_quoting("x>y"));
        assert!(needs_quoting("$HOME"));
        assert!(needs_quoting("user@host"));
        assert!(!needs_quoting("--flag=value"));
        assert!(!needs_quoting("/path/to/file.txt"));
        assert!(!needs_quoting("*.txt"));
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote(""), "''");
        assert_eq!(quote("plain.txt"), "plain.txt");
        assert_eq!(quote("a b"), "'a b'");
        assert_eq!(quote("it's"), r#"'it'"'"'s'"#);
    }

    #[test]
    fn test_shell_parses_back_original_tokens() {
        let tokens = vec![
            "printf".to_string(),
            "%s\n".to_string(),
            "two words".to_string(),
            "it's".to_string(),
            "a;b|c&d".to_string(),
            "$HOME".to_string(),
            "\"quoted\"".to_string(),
            "(paren) <in> @at".to_string(),
            "".to_string(),
        ];

        let line = join_quoted(&tokens);
        let output = Command::new("/bin/sh").arg("-c").arg(&line).output().unwrap();
        assert!(output.status.success());

        let printed = String::from_utf8(output.stdout).unwrap();
        let words: Vec<&str> = printed.split('\n').collect();
        assert_eq!(words[..tokens.len() - 2], tokens[2..]);
    }
}
