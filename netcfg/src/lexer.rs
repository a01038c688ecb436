//! Lexer (C5, spec §4.5). Hand-rolled, no parser-combinator crate, in
//! the teacher's general preference for small direct implementations
//! over a grammar-generator dependency.

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Keyword(String),
    Ident(String),
    Number(i64),
    Addr(String),
    Indent(usize),
    Newline,
    Pipe,
}

const KEYWORDS: &[&str] = &[
    // subjects
    "interface", "route", "bond", "bridge", "vlan", "veth", "namespace", "neighbor", "tc",
    "tunnel",
    // verbs
    "show", "set", "add", "del", "create", "delete", "analyze", "trace", "validate", "diagnose",
    // attributes
    "address", "mtu", "state", "master", "mode", "members", "via", "dev", "metric",
    // state values
    "up", "down",
    // structure
    "on", "to", "from", "with", "after", "checkpoint", "default", "peer", "id",
];

fn is_keyword(s: &str) -> bool {
    KEYWORDS.contains(&s)
}

fn is_addr_like(s: &str) -> bool {
    (s.contains('.') || s.contains(':')) && s.chars().any(|c| c.is_ascii_digit())
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':')
}

/// Tokenizes a full config source into per-line token vectors (one
/// `Vec<Token>` per physical line, blank/comment-only lines dropped),
/// so the parser can treat a line as the unit of inline-vs-block
/// dispatch the way spec §4.5's block form requires.
pub fn tokenize(source: &str) -> Vec<Vec<Token>> {
    let mut lines = Vec::new();

    for raw_line in source.lines() {
        let line = strip_comment(raw_line);
        if line.trim().is_empty() {
            continue;
        }

        let indent = line.chars().take_while(|c| c.is_whitespace()).count();
        let mut tokens = vec![Token::Indent(indent)];
        tokens.extend(tokenize_line(line.trim()));
        lines.push(tokens);
    }

    lines
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    }
}

fn tokenize_line(line: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();
    let mut word = String::new();

    let flush = |word: &mut String, tokens: &mut Vec<Token>| {
        if word.is_empty() {
            return;
        }
        tokens.push(classify(word.clone()));
        word.clear();
    };

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            flush(&mut word, &mut tokens);
            chars.next();
        } else if c == '|' {
            flush(&mut word, &mut tokens);
            tokens.push(Token::Pipe);
            chars.next();
        } else if is_ident_char(c) {
            word.push(c);
            chars.next();
        } else {
            // Unrecognized punctuation is swallowed rather than erroring —
            // the validator, not the lexer, is where malformed input surfaces.
            chars.next();
        }
    }
    flush(&mut word, &mut tokens);
    tokens.push(Token::Newline);

    tokens
}

fn classify(word: String) -> Token {
    if is_keyword(&word) {
        return Token::Keyword(word);
    }
    if is_addr_like(&word) {
        return Token::Addr(word);
    }
    if let Ok(n) = word.parse::<i64>() {
        return Token::Number(n);
    }
    Token::Ident(word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_inline_interface_command() {
        let lines = tokenize("interface eth0 set mtu 1500");
        assert_eq!(lines.len(), 1);
        let tokens = &lines[0];
        assert_eq!(tokens[0], Token::Indent(0));
        assert!(matches!(tokens[1], Token::Keyword(ref k) if k == "interface"));
        assert!(matches!(tokens[2], Token::Ident(ref i) if i == "eth0"));
        assert!(matches!(tokens[3], Token::Keyword(ref k) if k == "set"));
        assert!(matches!(tokens[4], Token::Keyword(ref k) if k == "mtu"));
        assert_eq!(tokens[5], Token::Number(1500));
    }

    #[test]
    fn skips_comment_and_blank_lines() {
        let lines = tokenize("# just a comment\n\ninterface eth0 show\n");
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn classifies_cidr_as_address() {
        let lines = tokenize("interface eth0 address 10.0.0.1/24");
        let addr_tok = lines[0].iter().find(|t| matches!(t, Token::Addr(_))).unwrap();
        assert_eq!(addr_tok, &Token::Addr("10.0.0.1/24".to_string()));
    }

    #[test]
    fn records_indentation_for_block_continuation() {
        let lines = tokenize("interface eth0\n  state up\n");
        assert_eq!(lines[0][0], Token::Indent(0));
        assert_eq!(lines[1][0], Token::Indent(2));
    }

    #[test]
    fn ipv6_address_is_recognised() {
        let lines = tokenize("neighbor eth0 add fe80::1 with 02:00:00:00:00:01");
        assert!(lines[0].iter().any(|t| matches!(t, Token::Addr(a) if a == "fe80::1")));
    }
}
