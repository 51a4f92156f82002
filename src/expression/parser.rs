//! Recursive-descent parser for attribute expressions.
//!
//! ```text
//! expr        := (literal | optional | placeholder)*
//! optional    := '[' expr ']'
//! placeholder := '{' ws '@'? '!'? name ws (':' ws pattern)? '}'
//! ```
//!
//! Malformed constructs never fail the parse: an unclosed `[`, a stray `]` or
//! a `{` that does not start a placeholder are kept as literal text.

/// A node of a parsed expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Literal(String),
    Optional(Segment),
    Placeholder(Placeholder),
}

/// Bracketed optional segment, with the raw text between the brackets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub source: String,
    pub nodes: Vec<Node>,
}

/// `{@!name:pattern}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    /// `@`: substitute nothing when the condition holds
    pub empty: bool,
    /// `!`: negate the condition
    pub negate: bool,
    pub name: String,
    /// Whole-value regex condition
    pub pattern: Option<String>,
}

pub(crate) fn parse_nodes(source: &str) -> Vec<Node> {
    let mut parser = Parser {
        src: source,
        bytes: source.as_bytes(),
        pos: 0,
    };
    parser.sequence(false).0
}

struct Parser<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    /// Parse until end of input, or until the `]` closing an optional.
    ///
    /// The flag is false when `in_optional` and the input ends before `]`;
    /// the nodes parsed so far are still returned so the caller can keep
    /// them as text without scanning them again.
    fn sequence(&mut self, in_optional: bool) -> (Vec<Node>, bool) {
        let mut nodes = Vec::new();

        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b'[' => {
                    let open = self.pos;
                    self.pos += 1;
                    let (inner, closed) = self.sequence(true);
                    if closed {
                        let source = self.src[open + 1..self.pos - 1].to_string();
                        nodes.push(Node::Optional(Segment {
                            source,
                            nodes: inner,
                        }));
                    } else {
                        // unclosed: the bracket is text, the rest ran to end of input
                        push_literal(&mut nodes, "[");
                        for node in inner {
                            match node {
                                Node::Literal(text) => push_literal(&mut nodes, &text),
                                other => nodes.push(other),
                            }
                        }
                    }
                }
                b']' => {
                    self.pos += 1;
                    if in_optional {
                        return (nodes, true);
                    }
                    push_literal(&mut nodes, "]");
                }
                b'{' => match self.placeholder() {
                    Some(placeholder) => nodes.push(Node::Placeholder(placeholder)),
                    None => {
                        self.pos += 1;
                        push_literal(&mut nodes, "{");
                    }
                },
                _ => {
                    let start = self.pos;
                    while self.pos < self.bytes.len()
                        && !matches!(self.bytes[self.pos], b'[' | b']' | b'{')
                    {
                        self.pos += 1;
                    }
                    push_literal(&mut nodes, &self.src[start..self.pos]);
                }
            }
        }

        (nodes, !in_optional)
    }

    /// Parse a placeholder at `{`. On failure the position is left unchanged.
    fn placeholder(&mut self) -> Option<Placeholder> {
        let mut p = self.pos + 1;
        p = self.skip_ws(p);

        let empty = self.bytes.get(p) == Some(&b'@');
        if empty {
            p += 1;
        }
        let negate = self.bytes.get(p) == Some(&b'!');
        if negate {
            p += 1;
        }

        let name_start = p;
        while p < self.bytes.len() && (self.bytes[p].is_ascii_alphanumeric() || self.bytes[p] == b'_') {
            p += 1;
        }
        if p == name_start {
            return None;
        }
        let name = self.src[name_start..p].to_string();
        p = self.skip_ws(p);

        let mut pattern = None;
        if self.bytes.get(p) == Some(&b':') {
            p = self.skip_ws(p + 1);
            let pattern_start = p;
            let mut depth = 0usize;
            loop {
                match self.bytes.get(p) {
                    None => return None,
                    Some(b'{') => depth += 1,
                    Some(b'}') if depth == 0 => break,
                    Some(b'}') => depth -= 1,
                    Some(_) => {}
                }
                p += 1;
            }
            pattern = Some(self.src[pattern_start..p].to_string());
        }

        if self.bytes.get(p) != Some(&b'}') {
            return None;
        }
        self.pos = p + 1;

        Some(Placeholder {
            empty,
            negate,
            name,
            pattern,
        })
    }

    fn skip_ws(&self, mut p: usize) -> usize {
        while p < self.bytes.len() && self.bytes[p].is_ascii_whitespace() {
            p += 1;
        }
        p
    }
}

fn push_literal(nodes: &mut Vec<Node>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Node::Literal(last)) = nodes.last_mut() {
        last.push_str(text);
    } else {
        nodes.push(Node::Literal(text.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(s: &str) -> Node {
        Node::Literal(s.to_string())
    }

    fn ph(name: &str) -> Node {
        Node::Placeholder(Placeholder {
            empty: false,
            negate: false,
            name: name.to_string(),
            pattern: None,
        })
    }

    #[test]
    fn test_parse_literal() {
        assert_eq!(parse_nodes("uk-card"), vec![lit("uk-card")]);
    }

    #[test]
    fn test_parse_flags_and_pattern() {
        let nodes = parse_nodes("{ @!size : (small|large) }");
        assert_eq!(
            nodes,
            vec![Node::Placeholder(Placeholder {
                empty: true,
                negate: true,
                name: "size".to_string(),
                pattern: Some("(small|large) ".to_string()),
            })]
        );
    }

    #[test]
    fn test_pattern_keeps_brackets_and_braces() {
        let nodes = parse_nodes("{a:[0-9]{2}}");
        match &nodes[0] {
            Node::Placeholder(p) => assert_eq!(p.pattern.as_deref(), Some("[0-9]{2}")),
            other => panic!("unexpected node {:?}", other),
        }
        assert_eq!(nodes.len(), 1);
    }

    #[test]
    fn test_nested_optionals() {
        let nodes = parse_nodes("x[a{b}[c{d}]]y");
        assert_eq!(nodes.len(), 3);
        match &nodes[1] {
            Node::Optional(seg) => {
                assert_eq!(seg.source, "a{b}[c{d}]");
                assert_eq!(seg.nodes[0], lit("a"));
                assert_eq!(seg.nodes[1], ph("b"));
                match &seg.nodes[2] {
                    Node::Optional(inner) => {
                        assert_eq!(inner.source, "c{d}");
                        assert_eq!(inner.nodes, vec![lit("c"), ph("d")]);
                    }
                    other => panic!("unexpected node {:?}", other),
                }
            }
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn test_malformed_input_is_literal() {
        assert_eq!(parse_nodes("a ] b"), vec![lit("a ] b")]);
        assert_eq!(parse_nodes("{ not closed"), vec![lit("{ not closed")]);
        assert_eq!(parse_nodes("{-x}"), vec![lit("{-x}")]);

        let nodes = parse_nodes("[a [b]");
        assert_eq!(nodes[0], lit("[a "));
        assert!(matches!(&nodes[1], Node::Optional(seg) if seg.source == "b"));
    }

    #[test]
    fn test_unclosed_brackets_parse_in_one_pass() {
        let source = format!("{{a}}{}", "[".repeat(64));
        let nodes = parse_nodes(&source);
        assert_eq!(nodes, vec![ph("a"), lit(&"[".repeat(64))]);

        let nodes = parse_nodes("[[x{a}[y]");
        assert_eq!(nodes[0], lit("[[x"));
        assert_eq!(nodes[1], ph("a"));
        assert!(matches!(&nodes[2], Node::Optional(seg) if seg.source == "y"));
        assert_eq!(nodes.len(), 3);
    }
}
