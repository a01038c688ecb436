//! Parser (C5, spec §4.5). Turns a token stream into a flat list of
//! `Command`s, rewriting block continuations into their canonical
//! inline form as they're consumed.

use crate::lexer::Token;

const SUBJECTS: &[&str] = &[
    "interface", "route", "bond", "bridge", "vlan", "veth", "namespace", "neighbor", "tc",
    "tunnel",
];

const VERBS: &[&str] = &[
    "show", "set", "add", "del", "create", "delete", "analyze", "trace", "validate", "diagnose",
];

const ATTR_KEYWORDS: &[&str] = &[
    "address", "mtu", "state", "master", "mode", "members", "via", "dev", "metric", "to", "from",
    "with", "on", "checkpoint", "after", "peer", "id",
];

#[derive(Debug, Clone)]
pub struct Command {
    pub subject: String,
    pub name: Option<String>,
    pub verb: String,
    pub attrs: Vec<(String, String)>,
    pub positional: Vec<String>,
    pub warnings: Vec<String>,
}

impl Command {
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn has_flag(&self, key: &str) -> bool {
        self.attrs.iter().any(|(k, _)| k == key)
    }
}

fn token_value(t: &Token) -> String {
    match t {
        Token::Ident(s) => s.clone(),
        Token::Addr(s) => s.clone(),
        Token::Number(n) => n.to_string(),
        Token::Keyword(s) => s.clone(),
        Token::Newline => String::new(),
        Token::Pipe => "|".to_string(),
        Token::Indent(_) => String::new(),
    }
}

/// Parses the body of a single line (everything after the leading
/// `Indent` token and, for continuations, after the subject/name the
/// caller already consumed) into a verb plus attribute/positional list.
fn parse_body(tokens: &[Token]) -> (String, Vec<(String, String)>, Vec<String>, Vec<String>) {
    let mut verb = "show".to_string();
    let mut attrs = Vec::new();
    let mut positional = Vec::new();
    let mut warnings = Vec::new();
    let mut verb_set = false;

    let mut i = 0;
    while i < tokens.len() {
        match &tokens[i] {
            Token::Newline => break,
            Token::Keyword(k) if VERBS.contains(&k.as_str()) && !verb_set => {
                verb = k.clone();
                verb_set = true;
                i += 1;
            }
            Token::Keyword(k) if k == "up" || k == "down" => {
                verb = "set".to_string();
                verb_set = true;
                attrs.push(("state".to_string(), k.clone()));
                i += 1;
            }
            Token::Keyword(k) if k == "default" => {
                attrs.push(("default".to_string(), "true".to_string()));
                i += 1;
            }
            Token::Keyword(k) if ATTR_KEYWORDS.contains(&k.as_str()) => {
                let key = k.clone();
                if i + 1 < tokens.len() && !matches!(tokens[i + 1], Token::Newline) {
                    let value = token_value(&tokens[i + 1]);
                    attrs.push((key, value));
                    i += 2;
                } else {
                    warnings.push(format!("attribute '{key}' has no value"));
                    i += 1;
                }
            }
            Token::Keyword(k) => {
                warnings.push(format!("unrecognized keyword '{k}' in this position"));
                i += 1;
            }
            Token::Ident(s) => {
                positional.push(s.clone());
                i += 1;
            }
            Token::Addr(s) => {
                positional.push(s.clone());
                i += 1;
            }
            Token::Number(n) => {
                positional.push(n.to_string());
                i += 1;
            }
            Token::Pipe => {
                i += 1;
            }
            Token::Indent(_) => {
                i += 1;
            }
        }
    }

    // An inline `subject name <attrs>` with no explicit verb but an
    // `address` attribute is an add, not a listing (spec §8.3).
    if !verb_set && attrs.iter().any(|(k, _)| k == "address") {
        verb = "add".to_string();
    }

    (verb, attrs, positional, warnings)
}

/// Rewrites an `interface` block continuation line into its canonical
/// inline attrs, per spec §4.5's continuation table.
fn rewrite_interface_continuation(tokens: &[Token]) -> (String, Vec<(String, String)>) {
    match tokens {
        [Token::Keyword(k), Token::Keyword(v), ..] if k == "state" && (v == "up" || v == "down") => {
            ("set".to_string(), vec![("state".to_string(), v.clone())])
        }
        [Token::Keyword(k), ..] if k == "up" || k == "down" => {
            ("set".to_string(), vec![("state".to_string(), k.clone())])
        }
        [Token::Keyword(k), Token::Addr(cidr), ..] if k == "address" => {
            ("add".to_string(), vec![("address".to_string(), cidr.clone())])
        }
        [Token::Keyword(k), Token::Number(n), ..] if k == "mtu" => {
            ("set".to_string(), vec![("mtu".to_string(), n.to_string())])
        }
        _ => {
            let (verb, attrs, _, _) = parse_body(tokens);
            (verb, attrs)
        }
    }
}

/// Parses a full token stream (one `Vec<Token>` per physical source
/// line) into the flat command list the executor consumes.
pub fn parse(lines: &[Vec<Token>]) -> Vec<Command> {
    let mut commands = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = &lines[i];
        let indent = match line.first() {
            Some(Token::Indent(n)) => *n,
            _ => 0,
        };
        let rest = &line[1..];

        let Some(Token::Keyword(subject)) = rest.first() else {
            i += 1;
            continue;
        };
        if !SUBJECTS.contains(&subject.as_str()) {
            i += 1;
            continue;
        }
        let subject = subject.clone();

        // `vlan <id> on <dev>` (spec §8.5) has a numeric id where the name
        // would go, so the generic Ident-based name parsing below can't
        // see it; special-case the whole header.
        if subject == "vlan" {
            if let (Some(Token::Number(id)), Some(Token::Keyword(on)), Some(Token::Ident(dev))) =
                (rest.get(1), rest.get(2), rest.get(3))
            {
                if on == "on" {
                    commands.push(Command {
                        subject,
                        name: None,
                        verb: "create".to_string(),
                        attrs: vec![("id".to_string(), id.to_string()), ("dev".to_string(), dev.clone())],
                        positional: Vec::new(),
                        warnings: Vec::new(),
                    });
                    i += 1;
                    continue;
                }
            }
        }

        let mut cursor = 1;
        let name = match rest.get(cursor) {
            Some(Token::Ident(n)) => {
                cursor += 1;
                Some(n.clone())
            }
            _ => None,
        };

        let body = &rest[cursor..];
        let has_own_verb_or_attrs = body
            .iter()
            .any(|t| !matches!(t, Token::Newline));

        // Collect indented continuation lines that follow this header.
        let mut continuation_count = 0;
        let mut j = i + 1;
        while j < lines.len() {
            let next_indent = match lines[j].first() {
                Some(Token::Indent(n)) => *n,
                _ => 0,
            };
            if next_indent > indent {
                continuation_count += 1;
                j += 1;
            } else {
                break;
            }
        }

        if continuation_count > 0 {
            for cont_line in &lines[i + 1..i + 1 + continuation_count] {
                let cont_body = &cont_line[1..];
                let (verb, attrs) = if subject == "interface" {
                    rewrite_interface_continuation(cont_body)
                } else {
                    let (v, a, _, _) = parse_body(cont_body);
                    (v, a)
                };
                commands.push(Command {
                    subject: subject.clone(),
                    name: name.clone(),
                    verb,
                    attrs,
                    positional: Vec::new(),
                    warnings: Vec::new(),
                });
            }
            i = j;
            continue;
        }

        if has_own_verb_or_attrs {
            let (verb, attrs, positional, warnings) = parse_body(body);
            commands.push(Command { subject, name, verb, attrs, positional, warnings });
        } else {
            // bare `subject [name]` with no continuation: a listing.
            commands.push(Command {
                subject,
                name,
                verb: "show".to_string(),
                attrs: Vec::new(),
                positional: Vec::new(),
                warnings: Vec::new(),
            });
        }

        i += 1;
    }

    commands
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    #[test]
    fn parses_bare_listing_without_name() {
        let lines = tokenize("interface");
        let cmds = parse(&lines);
        assert_eq!(cmds.len(), 1);
        assert_eq!(cmds[0].subject, "interface");
        assert!(cmds[0].name.is_none());
        assert_eq!(cmds[0].verb, "show");
    }

    #[test]
    fn parses_inline_set_mtu() {
        let lines = tokenize("interface eth0 set mtu 1500");
        let cmds = parse(&lines);
        assert_eq!(cmds[0].name.as_deref(), Some("eth0"));
        assert_eq!(cmds[0].verb, "set");
        assert_eq!(cmds[0].attr("mtu"), Some("1500"));
    }

    #[test]
    fn rewrites_block_state_continuation() {
        let lines = tokenize("interface eth0\n  state up\n");
        let cmds = parse(&lines);
        assert_eq!(cmds.len(), 1);
        assert_eq!(cmds[0].verb, "set");
        assert_eq!(cmds[0].attr("state"), Some("up"));
    }

    #[test]
    fn rewrites_block_shorthand_up() {
        let lines = tokenize("interface eth0\n  up\n");
        let cmds = parse(&lines);
        assert_eq!(cmds[0].attr("state"), Some("up"));
    }

    #[test]
    fn rewrites_block_address_continuation() {
        let lines = tokenize("interface eth0\n  address 10.0.0.1/24\n");
        let cmds = parse(&lines);
        assert_eq!(cmds[0].verb, "add");
        assert_eq!(cmds[0].attr("address"), Some("10.0.0.1/24"));
    }

    #[test]
    fn multiple_continuations_emit_multiple_commands() {
        let lines = tokenize("interface eth0\n  up\n  mtu 9000\n");
        let cmds = parse(&lines);
        assert_eq!(cmds.len(), 2);
        assert_eq!(cmds[1].attr("mtu"), Some("9000"));
    }

    #[test]
    fn route_add_captures_via_and_dev() {
        let lines = tokenize("route add to 10.0.0.0/24 via 10.0.0.1 dev eth0");
        let cmds = parse(&lines);
        assert_eq!(cmds[0].subject, "route");
        assert_eq!(cmds[0].attr("to"), Some("10.0.0.0/24"));
        assert_eq!(cmds[0].attr("via"), Some("10.0.0.1"));
        assert_eq!(cmds[0].attr("dev"), Some("eth0"));
    }

    #[test]
    fn unrecognized_keyword_in_body_is_warned_not_rejected() {
        let lines = tokenize("interface eth0 set bridge");
        let cmds = parse(&lines);
        assert!(!cmds[0].warnings.is_empty());
    }

    #[test]
    fn inline_address_with_no_verb_defaults_to_add() {
        let lines = tokenize("interface eth0 address 10.0.0.1/24");
        let cmds = parse(&lines);
        assert_eq!(cmds[0].verb, "add");
        assert_eq!(cmds[0].attr("address"), Some("10.0.0.1/24"));
    }

    #[test]
    fn vlan_on_dev_header_lowers_to_create() {
        let lines = tokenize("vlan 100 on eth0");
        let cmds = parse(&lines);
        assert_eq!(cmds.len(), 1);
        assert_eq!(cmds[0].subject, "vlan");
        assert!(cmds[0].name.is_none());
        assert_eq!(cmds[0].verb, "create");
        assert_eq!(cmds[0].attr("id"), Some("100"));
        assert_eq!(cmds[0].attr("dev"), Some("eth0"));
    }
}
