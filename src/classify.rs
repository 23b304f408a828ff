//! Context-aware token classification.
//!
//! Rewrites the raw token stream into tokens whose categories mean
//! something to the section grammar: section headers, constraint labels,
//! variable identifiers, signed constants, comparison operators, and SOS
//! type markers. Keyword recognition is case-insensitive and may span up
//! to three raw tokens (`semi-continuous`, `subject to`). Longest match
//! wins throughout.

use std::fmt;

use crate::error::{LpError, LpResult};
use crate::lexer::RawToken;
use crate::model::ObjectiveSense;

const KEYWORDS_MIN: &[&str] = &["minimize", "minimum", "min"];
const KEYWORDS_MAX: &[&str] = &["maximize", "maximum", "max"];
const KEYWORDS_CONSTRAINTS: &[&str] = &["subject to", "such that", "st", "s.t."];
const KEYWORDS_BOUNDS: &[&str] = &["bounds", "bound"];
const KEYWORDS_GENERAL: &[&str] = &["general", "generals", "gen"];
const KEYWORDS_BINARY: &[&str] = &["binary", "binaries", "bin"];
const KEYWORDS_SEMI: &[&str] = &["semi-continuous", "semi", "semis"];
const KEYWORDS_SOS: &[&str] = &["sos"];
const KEYWORDS_END: &[&str] = &["end"];
const KEYWORDS_FREE: &[&str] = &["free"];
const KEYWORDS_INF: &[&str] = &["infinity", "inf"];

/// Section kinds of the LP format, used as bucket keys by the splitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    Objective,
    Constraints,
    Bounds,
    General,
    Binary,
    Semi,
    Sos,
    End,
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SectionKind::Objective => "objective",
            SectionKind::Constraints => "constraints",
            SectionKind::Bounds => "bounds",
            SectionKind::General => "general",
            SectionKind::Binary => "binary",
            SectionKind::Semi => "semi-continuous",
            SectionKind::Sos => "sos",
            SectionKind::End => "end",
        };
        write!(f, "{}", name)
    }
}

/// Comparison operator between an expression and a constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompOp {
    Less,
    LessEq,
    Equal,
    GreaterEq,
    Greater,
}

impl fmt::Display for CompOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            CompOp::Less => "<",
            CompOp::LessEq => "<=",
            CompOp::Equal => "=",
            CompOp::GreaterEq => ">=",
            CompOp::Greater => ">",
        };
        write!(f, "{}", op)
    }
}

/// Token stream after classification.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessedToken {
    /// Objective section header carrying the sense read from the keyword
    Objective(ObjectiveSense),
    /// Any other section header
    Section(SectionKind),
    ConstraintLabel(String),
    VariableId(String),
    Constant(f64),
    Comparison(CompOp),
    BracketOpen,
    BracketClose,
    Free,
    Slash,
    Asterisk,
    Caret,
    /// SOS type marker, digit 1 or 2
    SosType(u8),
}

impl fmt::Display for ProcessedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessedToken::Objective(_) => write!(f, "objective keyword"),
            ProcessedToken::Section(kind) => write!(f, "'{}' keyword", kind),
            ProcessedToken::ConstraintLabel(name) => write!(f, "label '{}:'", name),
            ProcessedToken::VariableId(name) => write!(f, "identifier '{}'", name),
            ProcessedToken::Constant(v) => write!(f, "constant {}", v),
            ProcessedToken::Comparison(op) => write!(f, "'{}'", op),
            ProcessedToken::BracketOpen => write!(f, "'['"),
            ProcessedToken::BracketClose => write!(f, "']'"),
            ProcessedToken::Free => write!(f, "'free'"),
            ProcessedToken::Slash => write!(f, "'/'"),
            ProcessedToken::Asterisk => write!(f, "'*'"),
            ProcessedToken::Caret => write!(f, "'^'"),
            ProcessedToken::SosType(t) => write!(f, "'S{} ::'", t),
        }
    }
}

fn is_keyword(word: &str, table: &[&str]) -> bool {
    table.iter().any(|kw| word.eq_ignore_ascii_case(kw))
}

enum Keyword {
    Objective(ObjectiveSense),
    Section(SectionKind),
}

fn keyword(word: &str) -> Option<Keyword> {
    if is_keyword(word, KEYWORDS_MIN) {
        return Some(Keyword::Objective(ObjectiveSense::Minimize));
    }
    if is_keyword(word, KEYWORDS_MAX) {
        return Some(Keyword::Objective(ObjectiveSense::Maximize));
    }
    let kind = if is_keyword(word, KEYWORDS_CONSTRAINTS) {
        SectionKind::Constraints
    } else if is_keyword(word, KEYWORDS_BOUNDS) {
        SectionKind::Bounds
    } else if is_keyword(word, KEYWORDS_GENERAL) {
        SectionKind::General
    } else if is_keyword(word, KEYWORDS_BINARY) {
        SectionKind::Binary
    } else if is_keyword(word, KEYWORDS_SEMI) {
        SectionKind::Semi
    } else if is_keyword(word, KEYWORDS_SOS) {
        SectionKind::Sos
    } else if is_keyword(word, KEYWORDS_END) {
        SectionKind::End
    } else {
        return None;
    };
    Some(Keyword::Section(kind))
}

fn header(kw: Keyword) -> ProcessedToken {
    match kw {
        Keyword::Objective(sense) => ProcessedToken::Objective(sense),
        Keyword::Section(kind) => ProcessedToken::Section(kind),
    }
}

/// The SOS type marker must be `S1` or `S2` (leading letter case-insensitive).
fn sos_type(word: &str) -> LpResult<u8> {
    let bytes = word.as_bytes();
    if bytes.len() == 2 && (bytes[0] == b'S' || bytes[0] == b's') {
        match bytes[1] {
            b'1' => return Ok(1),
            b'2' => return Ok(2),
            _ => {}
        }
    }
    Err(LpError::Classify(format!("SOS type '{}'", word)))
}

/// Rewrite the raw token sequence into processed tokens.
pub fn classify(raw: &[RawToken]) -> LpResult<Vec<ProcessedToken>> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        // hyphenated section keyword (semi-continuous)
        if let [RawToken::String(a), RawToken::Minus, RawToken::String(b), ..] = &raw[i..] {
            if let Some(kw) = keyword(&format!("{}-{}", a, b)) {
                out.push(header(kw));
                i += 3;
                continue;
            }
        }

        // two-word section keyword (subject to, such that)
        if let [RawToken::String(a), RawToken::String(b), ..] = &raw[i..] {
            if let Some(kw) = keyword(&format!("{} {}", a, b)) {
                out.push(header(kw));
                i += 2;
                continue;
            }
        }

        // single-word section keyword
        if let [RawToken::String(word), ..] = &raw[i..] {
            if let Some(kw) = keyword(word) {
                out.push(header(kw));
                i += 1;
                continue;
            }
        }

        // SOS type marker: S1 :: or S2 ::
        if let [RawToken::String(word), RawToken::Colon, RawToken::Colon, ..] = &raw[i..] {
            out.push(ProcessedToken::SosType(sos_type(word)?));
            i += 3;
            continue;
        }

        // constraint label
        if let [RawToken::String(name), RawToken::Colon, ..] = &raw[i..] {
            out.push(ProcessedToken::ConstraintLabel(name.clone()));
            i += 2;
            continue;
        }

        if let [RawToken::String(word), ..] = &raw[i..] {
            if is_keyword(word, KEYWORDS_FREE) {
                out.push(ProcessedToken::Free);
            } else if is_keyword(word, KEYWORDS_INF) {
                out.push(ProcessedToken::Constant(f64::INFINITY));
            } else {
                out.push(ProcessedToken::VariableId(word.clone()));
            }
            i += 1;
            continue;
        }

        // explicitly signed constant
        if let [RawToken::Plus, RawToken::Number(v), ..] = &raw[i..] {
            out.push(ProcessedToken::Constant(*v));
            i += 2;
            continue;
        }
        if let [RawToken::Minus, RawToken::Number(v), ..] = &raw[i..] {
            out.push(ProcessedToken::Constant(-v));
            i += 2;
            continue;
        }

        // signed infinity: the sign folds into the constant
        if let [RawToken::Plus, RawToken::String(word), ..] = &raw[i..] {
            if is_keyword(word, KEYWORDS_INF) {
                out.push(ProcessedToken::Constant(f64::INFINITY));
                i += 2;
                continue;
            }
        }
        if let [RawToken::Minus, RawToken::String(word), ..] = &raw[i..] {
            if is_keyword(word, KEYWORDS_INF) {
                out.push(ProcessedToken::Constant(f64::NEG_INFINITY));
                i += 2;
                continue;
            }
        }

        // a quadratic block's leading sign: '+' is discarded, '-' has no
        // defined meaning in the format
        if let [RawToken::Plus, RawToken::BracketOpen, ..] = &raw[i..] {
            out.push(ProcessedToken::BracketOpen);
            i += 2;
            continue;
        }
        if let [RawToken::Minus, RawToken::BracketOpen, ..] = &raw[i..] {
            return Err(LpError::Classify(
                "'-' before '[': negative quadratic blocks are not supported".to_string(),
            ));
        }

        // implicit coefficient
        if let [RawToken::Plus, ..] = &raw[i..] {
            out.push(ProcessedToken::Constant(1.0));
            i += 1;
            continue;
        }
        if let [RawToken::Minus, ..] = &raw[i..] {
            out.push(ProcessedToken::Constant(-1.0));
            i += 1;
            continue;
        }

        if let [RawToken::Number(v), ..] = &raw[i..] {
            out.push(ProcessedToken::Constant(*v));
            i += 1;
            continue;
        }

        if let Some(token) = match raw[i] {
            RawToken::BracketOpen => Some(ProcessedToken::BracketOpen),
            RawToken::BracketClose => Some(ProcessedToken::BracketClose),
            RawToken::Slash => Some(ProcessedToken::Slash),
            RawToken::Asterisk => Some(ProcessedToken::Asterisk),
            RawToken::Caret => Some(ProcessedToken::Caret),
            _ => None,
        } {
            out.push(token);
            i += 1;
            continue;
        }

        // comparison glyphs, fusing <= and >=
        if let [RawToken::Less, RawToken::Equal, ..] = &raw[i..] {
            out.push(ProcessedToken::Comparison(CompOp::LessEq));
            i += 2;
            continue;
        }
        if let [RawToken::Greater, RawToken::Equal, ..] = &raw[i..] {
            out.push(ProcessedToken::Comparison(CompOp::GreaterEq));
            i += 2;
            continue;
        }
        if let [RawToken::Less, ..] = &raw[i..] {
            out.push(ProcessedToken::Comparison(CompOp::Less));
            i += 1;
            continue;
        }
        if let [RawToken::Greater, ..] = &raw[i..] {
            out.push(ProcessedToken::Comparison(CompOp::Greater));
            i += 1;
            continue;
        }
        if let [RawToken::Equal, ..] = &raw[i..] {
            out.push(ProcessedToken::Comparison(CompOp::Equal));
            i += 1;
            continue;
        }

        if raw[i] == RawToken::FileEnd {
            break;
        }

        return Err(LpError::Classify(raw[i].to_string()));
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn classify_str(input: &str) -> LpResult<Vec<ProcessedToken>> {
        let raw = Lexer::new(input.as_bytes()).tokenize()?;
        classify(&raw)
    }

    fn tokens(input: &str) -> Vec<ProcessedToken> {
        classify_str(input).expect("classification failed")
    }

    #[test]
    fn test_objective_keywords_carry_sense() {
        for word in ["min", "minimize", "minimum", "MIN", "Minimize"] {
            assert_eq!(
                tokens(word),
                vec![ProcessedToken::Objective(ObjectiveSense::Minimize)],
                "keyword {}",
                word
            );
        }
        for word in ["max", "maximize", "maximum", "MAXIMUM"] {
            assert_eq!(
                tokens(word),
                vec![ProcessedToken::Objective(ObjectiveSense::Maximize)],
                "keyword {}",
                word
            );
        }
    }

    #[test]
    fn test_section_keyword_synonyms() {
        let cases: &[(&str, SectionKind)] = &[
            ("st", SectionKind::Constraints),
            ("s.t.", SectionKind::Constraints),
            ("subject to", SectionKind::Constraints),
            ("such that", SectionKind::Constraints),
            ("SUBJECT TO", SectionKind::Constraints),
            ("bounds", SectionKind::Bounds),
            ("bound", SectionKind::Bounds),
            ("general", SectionKind::General),
            ("generals", SectionKind::General),
            ("gen", SectionKind::General),
            ("binary", SectionKind::Binary),
            ("binaries", SectionKind::Binary),
            ("bin", SectionKind::Binary),
            ("semi-continuous", SectionKind::Semi),
            ("semi", SectionKind::Semi),
            ("semis", SectionKind::Semi),
            ("sos", SectionKind::Sos),
            ("end", SectionKind::End),
        ];
        for (input, kind) in cases {
            assert_eq!(
                tokens(input),
                vec![ProcessedToken::Section(*kind)],
                "keyword {}",
                input
            );
        }
    }

    #[test]
    fn test_label_and_variable() {
        assert_eq!(
            tokens("c1: x"),
            vec![
                ProcessedToken::ConstraintLabel("c1".to_string()),
                ProcessedToken::VariableId("x".to_string()),
            ]
        );
    }

    #[test]
    fn test_sos_type_marker() {
        assert_eq!(tokens("g: S1 :: x: 1")[1], ProcessedToken::SosType(1));
        assert_eq!(tokens("g: s2 :: x: 1")[1], ProcessedToken::SosType(2));
    }

    #[test]
    fn test_sos_type_digit_out_of_range() {
        assert!(matches!(
            classify_str("g: S3 :: x: 1"),
            Err(LpError::Classify(_))
        ));
    }

    #[test]
    fn test_free_and_infinity() {
        assert_eq!(
            tokens("x free"),
            vec![
                ProcessedToken::VariableId("x".to_string()),
                ProcessedToken::Free,
            ]
        );
        assert_eq!(tokens("inf"), vec![ProcessedToken::Constant(f64::INFINITY)]);
        assert_eq!(
            tokens("- infinity"),
            vec![ProcessedToken::Constant(f64::NEG_INFINITY)]
        );
        assert_eq!(
            tokens("+ inf"),
            vec![ProcessedToken::Constant(f64::INFINITY)]
        );
    }

    #[test]
    fn test_signed_constants_and_implicit_coefficients() {
        assert_eq!(tokens("+ 3")[0], ProcessedToken::Constant(3.0));
        assert_eq!(tokens("- 3")[0], ProcessedToken::Constant(-3.0));
        // bare signs become unit coefficients
        assert_eq!(
            tokens("- x"),
            vec![
                ProcessedToken::Constant(-1.0),
                ProcessedToken::VariableId("x".to_string()),
            ]
        );
        assert_eq!(tokens("+ x")[0], ProcessedToken::Constant(1.0));
        assert_eq!(tokens("7")[0], ProcessedToken::Constant(7.0));
    }

    #[test]
    fn test_plus_before_bracket_discarded() {
        assert_eq!(
            tokens("+ [ x ^ 2 ]")[0],
            ProcessedToken::BracketOpen,
        );
    }

    #[test]
    fn test_minus_before_bracket_rejected() {
        assert!(matches!(
            classify_str("- [ x ^ 2 ]"),
            Err(LpError::Classify(_))
        ));
    }

    #[test]
    fn test_comparison_fusion() {
        assert_eq!(
            tokens("< <= = >= >"),
            vec![
                ProcessedToken::Comparison(CompOp::Less),
                ProcessedToken::Comparison(CompOp::LessEq),
                ProcessedToken::Comparison(CompOp::Equal),
                ProcessedToken::Comparison(CompOp::GreaterEq),
                ProcessedToken::Comparison(CompOp::Greater),
            ]
        );
    }

    #[test]
    fn test_label_wins_over_free_keyword() {
        // a label named "free" is still a label
        assert_eq!(
            tokens("free: x")[0],
            ProcessedToken::ConstraintLabel("free".to_string())
        );
    }

    #[test]
    fn test_stray_colon_rejected() {
        assert!(matches!(classify_str(": x"), Err(LpError::Classify(_))));
    }
}
