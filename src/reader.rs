//! Section-driven parse of the processed token stream.
//!
//! The splitter partitions processed tokens into per-section buckets;
//! each section processor then drains its bucket into the model builder.
//! Sections are processed in a fixed order regardless of their order in
//! the file: objective, constraints, bounds, general, binary,
//! semi-continuous, SOS, end. The general/semi ordering is load-bearing:
//! a variable named in both sections becomes semi-integer.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::GzDecoder;

use crate::classify::{classify, CompOp, ProcessedToken, SectionKind};
use crate::error::{LpError, LpResult};
use crate::lexer::Lexer;
use crate::model::{
    Constraint, Expression, LinTerm, Model, ModelBuilder, QuadTerm, SosEntry, SosGroup,
    VariableType,
};

/// Read an LP model from a line-oriented byte source.
///
/// The source may be a plain file, a decompressed stream, or an in-memory
/// buffer; anything implementing [`BufRead`] works. On success the
/// returned model owns all of its contents; on failure no partial model
/// escapes.
pub fn read<R: BufRead>(source: R) -> LpResult<Model> {
    let raw = Lexer::new(source).tokenize()?;
    let tokens = classify(&raw)?;
    log::debug!(
        "classified {} raw tokens into {} processed tokens",
        raw.len(),
        tokens.len()
    );

    let mut parser = SectionParser::default();
    parser.split(tokens)?;
    parser.process_sections()?;

    let model = parser.builder.model;
    log::debug!(
        "parsed model: {} variables, {} constraints, {} SOS groups",
        model.num_vars(),
        model.num_constraints(),
        model.sos_groups.len()
    );
    Ok(model)
}

/// Read an LP model from a file path. Files ending in `.gz` are
/// decompressed on the fly.
pub fn read_path<P: AsRef<Path>>(path: P) -> LpResult<Model> {
    let path = path.as_ref();
    let file = File::open(path)?;
    if path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
    {
        read(BufReader::new(GzDecoder::new(file)))
    } else {
        read(BufReader::new(file))
    }
}

#[derive(Default)]
struct SectionParser {
    /// Tokens seen before the first section header; must end up empty.
    preamble: Vec<ProcessedToken>,
    /// Per-section buckets, drained by the processors.
    sections: HashMap<SectionKind, Vec<ProcessedToken>>,
    builder: ModelBuilder,
}

impl SectionParser {
    /// Partition the processed tokens by section header. Records the
    /// objective sense as a side effect.
    fn split(&mut self, tokens: Vec<ProcessedToken>) -> LpResult<()> {
        let mut current = None;
        for token in tokens {
            match token {
                ProcessedToken::Objective(sense) => {
                    self.enter_section(SectionKind::Objective)?;
                    self.builder.model.sense = sense;
                    current = Some(SectionKind::Objective);
                }
                ProcessedToken::Section(kind) => {
                    self.enter_section(kind)?;
                    current = Some(kind);
                }
                other => match current {
                    Some(kind) => self.sections.entry(kind).or_default().push(other),
                    None => self.preamble.push(other),
                },
            }
        }
        Ok(())
    }

    fn enter_section(&mut self, kind: SectionKind) -> LpResult<()> {
        if self.sections.contains_key(&kind) {
            return Err(LpError::Structural(format!(
                "section '{}' appears twice",
                kind
            )));
        }
        self.sections.insert(kind, Vec::new());
        Ok(())
    }

    fn take_bucket(&mut self, kind: SectionKind) -> Vec<ProcessedToken> {
        self.sections.remove(&kind).unwrap_or_default()
    }

    fn process_sections(&mut self) -> LpResult<()> {
        self.process_preamble()?;
        self.process_objective()?;
        self.process_constraints()?;
        self.process_bounds()?;
        self.process_general()?;
        self.process_binary()?;
        self.process_semi()?;
        self.process_sos()?;
        self.process_end()
    }

    fn process_preamble(&mut self) -> LpResult<()> {
        match self.preamble.first() {
            Some(token) => Err(LpError::Structural(format!(
                "{} before the first section keyword",
                token
            ))),
            None => Ok(()),
        }
    }

    fn process_objective(&mut self) -> LpResult<()> {
        let tokens = self.take_bucket(SectionKind::Objective);
        let mut expr = Expression::default();
        let mut i = 0;
        self.parse_expression(&tokens, &mut expr, &mut i, true)?;
        if i != tokens.len() {
            return Err(LpError::Structural(format!(
                "{} after the objective expression",
                tokens[i]
            )));
        }
        self.builder.model.objective = expr;
        Ok(())
    }

    fn process_constraints(&mut self) -> LpResult<()> {
        let tokens = self.take_bucket(SectionKind::Constraints);
        let mut i = 0;
        while i < tokens.len() {
            let mut con = Constraint::default();
            self.parse_expression(&tokens, &mut con.expr, &mut i, false)?;

            let (op, value) = match &tokens[i..] {
                [ProcessedToken::Comparison(op), ProcessedToken::Constant(v), ..] => (*op, *v),
                [ProcessedToken::Comparison(_), ..] => {
                    return Err(LpError::Semantic(
                        "constraint right-hand side must be a constant".to_string(),
                    ));
                }
                _ => {
                    return Err(LpError::Structural(
                        "expected comparison after constraint expression".to_string(),
                    ));
                }
            };
            match op {
                CompOp::Equal => {
                    con.lower = value;
                    con.upper = value;
                }
                CompOp::LessEq => con.upper = value,
                CompOp::GreaterEq => con.lower = value,
                CompOp::Less | CompOp::Greater => {
                    return Err(LpError::Semantic(format!(
                        "strict comparison '{}' is not allowed in a constraint",
                        op
                    )));
                }
            }
            i += 2;
            self.builder.model.constraints.push(con);
        }
        Ok(())
    }

    /// Parse one expression starting at `*i`, leaving `*i` on the first
    /// token that matches no pattern. The caller checks the remainder.
    ///
    /// In the objective, a quadratic block must be followed by `/ 2`; the
    /// raw coefficients are kept and the halving is the consumer's job.
    fn parse_expression(
        &mut self,
        tokens: &[ProcessedToken],
        expr: &mut Expression,
        i: &mut usize,
        is_objective: bool,
    ) -> LpResult<()> {
        if let Some(ProcessedToken::ConstraintLabel(name)) = tokens.get(*i) {
            expr.name = Some(name.clone());
            *i += 1;
        }

        loop {
            match &tokens[*i..] {
                // coefficient-variable pair; must be tried before the
                // single-token constant and variable forms
                [ProcessedToken::Constant(c), ProcessedToken::VariableId(name), ..] => {
                    let var = self.builder.var_by_name(name);
                    expr.lin_terms.push(LinTerm { coef: *c, var });
                    *i += 2;
                }
                // bare constant overwrites the running offset
                [ProcessedToken::Constant(c), ..] => {
                    expr.offset = *c;
                    *i += 1;
                }
                [ProcessedToken::VariableId(name), ..] => {
                    let var = self.builder.var_by_name(name);
                    expr.lin_terms.push(LinTerm { coef: 1.0, var });
                    *i += 1;
                }
                [ProcessedToken::BracketOpen, ..] => {
                    *i += 1;
                    self.parse_quadratic_block(tokens, expr, i, is_objective)?;
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn parse_quadratic_block(
        &mut self,
        tokens: &[ProcessedToken],
        expr: &mut Expression,
        i: &mut usize,
        is_objective: bool,
    ) -> LpResult<()> {
        loop {
            match &tokens[*i..] {
                [ProcessedToken::Constant(c), ProcessedToken::VariableId(name), ProcessedToken::Caret, ProcessedToken::Constant(exp), ..] =>
                {
                    square_exponent(*exp)?;
                    let var = self.builder.var_by_name(name);
                    expr.quad_terms.push(QuadTerm {
                        coef: *c,
                        var1: var,
                        var2: var,
                    });
                    *i += 4;
                }
                [ProcessedToken::VariableId(name), ProcessedToken::Caret, ProcessedToken::Constant(exp), ..] =>
                {
                    square_exponent(*exp)?;
                    let var = self.builder.var_by_name(name);
                    expr.quad_terms.push(QuadTerm {
                        coef: 1.0,
                        var1: var,
                        var2: var,
                    });
                    *i += 3;
                }
                [ProcessedToken::Constant(c), ProcessedToken::VariableId(n1), ProcessedToken::Asterisk, ProcessedToken::VariableId(n2), ..] =>
                {
                    let var1 = self.builder.var_by_name(n1);
                    let var2 = self.builder.var_by_name(n2);
                    expr.quad_terms.push(QuadTerm {
                        coef: *c,
                        var1,
                        var2,
                    });
                    *i += 4;
                }
                [ProcessedToken::VariableId(n1), ProcessedToken::Asterisk, ProcessedToken::VariableId(n2), ..] =>
                {
                    let var1 = self.builder.var_by_name(n1);
                    let var2 = self.builder.var_by_name(n2);
                    expr.quad_terms.push(QuadTerm {
                        coef: 1.0,
                        var1,
                        var2,
                    });
                    *i += 3;
                }
                _ => break,
            }
        }

        match tokens.get(*i) {
            Some(ProcessedToken::BracketClose) => *i += 1,
            Some(token) => {
                return Err(LpError::Structural(format!(
                    "{} inside a quadratic block",
                    token
                )));
            }
            None => {
                return Err(LpError::Structural(
                    "quadratic block is missing its closing ']'".to_string(),
                ));
            }
        }

        if is_objective {
            // only in the objective is the block followed by "/ 2"
            match &tokens[*i..] {
                [ProcessedToken::Slash, ProcessedToken::Constant(v), ..] if *v == 2.0 => *i += 2,
                _ => {
                    return Err(LpError::Structural(
                        "quadratic objective block must be followed by '/ 2'".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    fn process_bounds(&mut self) -> LpResult<()> {
        let tokens = self.take_bucket(SectionKind::Bounds);
        let mut i = 0;
        while i < tokens.len() {
            match &tokens[i..] {
                [ProcessedToken::VariableId(name), ProcessedToken::Free, ..] => {
                    let var = self.builder.var_by_name(name);
                    let v = &mut self.builder.model.variables[var];
                    v.lower = f64::NEG_INFINITY;
                    v.upper = f64::INFINITY;
                    i += 2;
                }
                // lb <= x <= ub
                [ProcessedToken::Constant(lb), ProcessedToken::Comparison(c1), ProcessedToken::VariableId(name), ProcessedToken::Comparison(c2), ProcessedToken::Constant(ub), ..] =>
                {
                    if *c1 != CompOp::LessEq || *c2 != CompOp::LessEq {
                        return Err(LpError::Semantic(
                            "double-sided bound must use '<=' on both sides".to_string(),
                        ));
                    }
                    let var = self.builder.var_by_name(name);
                    let v = &mut self.builder.model.variables[var];
                    v.lower = *lb;
                    v.upper = *ub;
                    i += 5;
                }
                // constant on the left: "c <= x" bounds x from below
                [ProcessedToken::Constant(value), ProcessedToken::Comparison(op), ProcessedToken::VariableId(name), ..] =>
                {
                    let op = bounds_op(*op)?;
                    let var = self.builder.var_by_name(name);
                    let v = &mut self.builder.model.variables[var];
                    match op {
                        CompOp::LessEq => v.lower = *value,
                        CompOp::GreaterEq => v.upper = *value,
                        _ => {
                            v.lower = *value;
                            v.upper = *value;
                        }
                    }
                    i += 3;
                }
                // variable on the left: "x <= c" bounds x from above
                [ProcessedToken::VariableId(name), ProcessedToken::Comparison(op), ProcessedToken::Constant(value), ..] =>
                {
                    let op = bounds_op(*op)?;
                    let var = self.builder.var_by_name(name);
                    let v = &mut self.builder.model.variables[var];
                    match op {
                        CompOp::LessEq => v.upper = *value,
                        CompOp::GreaterEq => v.lower = *value,
                        _ => {
                            v.lower = *value;
                            v.upper = *value;
                        }
                    }
                    i += 3;
                }
                [token, ..] => {
                    return Err(LpError::Structural(format!(
                        "{} does not start a bounds entry",
                        token
                    )));
                }
                [] => unreachable!(),
            }
        }
        Ok(())
    }

    fn process_binary(&mut self) -> LpResult<()> {
        for token in self.take_bucket(SectionKind::Binary) {
            match token {
                ProcessedToken::VariableId(name) => {
                    let var = self.builder.var_by_name(&name);
                    let v = &mut self.builder.model.variables[var];
                    v.var_type = VariableType::Binary;
                    v.lower = 0.0;
                    v.upper = 1.0;
                }
                other => {
                    return Err(LpError::Structural(format!(
                        "{} in the binary section",
                        other
                    )));
                }
            }
        }
        Ok(())
    }

    fn process_general(&mut self) -> LpResult<()> {
        for token in self.take_bucket(SectionKind::General) {
            match token {
                ProcessedToken::VariableId(name) => {
                    let var = self.builder.var_by_name(&name);
                    let v = &mut self.builder.model.variables[var];
                    // a semi-continuous variable declared integer becomes semi-integer
                    v.var_type = match v.var_type {
                        VariableType::SemiContinuous => VariableType::SemiInteger,
                        _ => VariableType::General,
                    };
                }
                other => {
                    return Err(LpError::Structural(format!(
                        "{} in the general section",
                        other
                    )));
                }
            }
        }
        Ok(())
    }

    fn process_semi(&mut self) -> LpResult<()> {
        for token in self.take_bucket(SectionKind::Semi) {
            match token {
                ProcessedToken::VariableId(name) => {
                    let var = self.builder.var_by_name(&name);
                    let v = &mut self.builder.model.variables[var];
                    v.var_type = match v.var_type {
                        VariableType::General => VariableType::SemiInteger,
                        _ => VariableType::SemiContinuous,
                    };
                }
                other => {
                    return Err(LpError::Structural(format!(
                        "{} in the semi-continuous section",
                        other
                    )));
                }
            }
        }
        Ok(())
    }

    fn process_sos(&mut self) -> LpResult<()> {
        let tokens = self.take_bucket(SectionKind::Sos);
        let mut i = 0;
        while i < tokens.len() {
            // group name is mandatory
            let name = match &tokens[i] {
                ProcessedToken::ConstraintLabel(name) => name.clone(),
                other => {
                    return Err(LpError::Structural(format!(
                        "SOS group must start with a name label, found {}",
                        other
                    )));
                }
            };
            i += 1;

            let sos_type = match tokens.get(i) {
                Some(ProcessedToken::SosType(t)) => *t,
                _ => {
                    return Err(LpError::Structural(format!(
                        "SOS group '{}' is missing its 'S1 ::' or 'S2 ::' marker",
                        name
                    )));
                }
            };
            i += 1;

            // "x : w" entries come out of the classifier as labels, since
            // it cannot locally tell them apart from constraint labels;
            // here they are variable references
            let mut entries = Vec::new();
            while let [ProcessedToken::ConstraintLabel(var_name), ProcessedToken::Constant(weight), ..] =
                &tokens[i..]
            {
                let var = self.builder.var_by_name(var_name);
                entries.push(SosEntry {
                    var,
                    weight: *weight,
                });
                i += 2;
            }

            self.builder.model.sos_groups.push(SosGroup {
                name,
                sos_type,
                entries,
            });
        }
        Ok(())
    }

    fn process_end(&mut self) -> LpResult<()> {
        let tokens = self.take_bucket(SectionKind::End);
        match tokens.first() {
            Some(token) => Err(LpError::Structural(format!(
                "{} after the end marker",
                token
            ))),
            None => Ok(()),
        }
    }
}

/// Bounds entries allow only `<=`, `>=`, `=`.
fn bounds_op(op: CompOp) -> LpResult<CompOp> {
    match op {
        CompOp::Less | CompOp::Greater => Err(LpError::Semantic(format!(
            "strict comparison '{}' is not allowed in a bound",
            op
        ))),
        other => Ok(other),
    }
}

/// The only exponent the format admits is 2.
fn square_exponent(exp: f64) -> LpResult<()> {
    if exp == 2.0 {
        Ok(())
    } else {
        Err(LpError::Semantic(format!(
            "quadratic term exponent must be 2, found {}",
            exp
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ObjectiveSense;

    fn read_str(input: &str) -> LpResult<Model> {
        read(input.as_bytes())
    }

    #[test]
    fn test_preamble_tokens_rejected() {
        let err = read_str("x + y\nmin\n obj: x\nend\n").unwrap_err();
        assert!(matches!(err, LpError::Structural(_)));
    }

    #[test]
    fn test_duplicate_section_rejected() {
        let err = read_str("min\n o: x\nst\n x <= 1\nst\n x >= 0\nend\n").unwrap_err();
        assert!(matches!(err, LpError::Structural(_)));
    }

    #[test]
    fn test_duplicate_empty_section_rejected() {
        // both bounds sections are empty; the repeat is still an error
        let err = read_str("min\n o: x\nbounds\nbounds\nend\n").unwrap_err();
        assert!(matches!(err, LpError::Structural(_)));
    }

    #[test]
    fn test_tokens_after_end_rejected() {
        let err = read_str("min\n o: x\nend\n y\n").unwrap_err();
        assert!(matches!(err, LpError::Structural(_)));
    }

    #[test]
    fn test_trailing_objective_tokens_rejected() {
        // a lone ']' cannot be part of the objective expression
        let err = read_str("min\n o: x ]\nend\n").unwrap_err();
        assert!(matches!(err, LpError::Structural(_)));
    }

    #[test]
    fn test_objective_sense_recorded() {
        let model = read_str("max\n o: x\nend\n").unwrap();
        assert_eq!(model.sense, ObjectiveSense::Maximize);
        let model = read_str("min\n o: x\nend\n").unwrap();
        assert_eq!(model.sense, ObjectiveSense::Minimize);
    }

    #[test]
    fn test_constant_on_left_of_bound_is_lower() {
        // "1 <= x" reads: 1 is a lower bound on x
        let model = read_str("min\n o: x\nbounds\n 1 <= x\nend\n").unwrap();
        let x = model.var_index("x").unwrap();
        assert_eq!(model.variables[x].lower, 1.0);
        assert_eq!(model.variables[x].upper, f64::INFINITY);
    }

    #[test]
    fn test_constant_on_left_geq_is_upper() {
        // "3 >= x" caps x from above
        let model = read_str("min\n o: x\nbounds\n 3 >= x\nend\n").unwrap();
        let x = model.var_index("x").unwrap();
        assert_eq!(model.variables[x].lower, 0.0);
        assert_eq!(model.variables[x].upper, 3.0);
    }

    #[test]
    fn test_equality_bound_pins_both_sides() {
        let model = read_str("min\n o: x\nbounds\n x = 2\nend\n").unwrap();
        let x = model.var_index("x").unwrap();
        assert_eq!(model.variables[x].lower, 2.0);
        assert_eq!(model.variables[x].upper, 2.0);
    }

    #[test]
    fn test_double_sided_bound_requires_leq() {
        let err = read_str("min\n o: x\nbounds\n 5 >= x >= 1\nend\n").unwrap_err();
        assert!(matches!(err, LpError::Semantic(_)));
    }

    #[test]
    fn test_strict_bound_comparison_rejected() {
        let err = read_str("min\n o: x\nbounds\n x < 5\nend\n").unwrap_err();
        assert!(matches!(err, LpError::Semantic(_)));
    }

    #[test]
    fn test_infinity_bounds() {
        let model =
            read_str("min\n o: x + y\nbounds\n x <= inf\n y >= - infinity\nend\n").unwrap();
        let x = model.var_index("x").unwrap();
        let y = model.var_index("y").unwrap();
        assert_eq!(model.variables[x].upper, f64::INFINITY);
        assert_eq!(model.variables[y].lower, f64::NEG_INFINITY);
    }

    #[test]
    fn test_non_variable_in_type_section_rejected() {
        let err = read_str("min\n o: x\nbinary\n 5\nend\n").unwrap_err();
        assert!(matches!(err, LpError::Structural(_)));
    }

    #[test]
    fn test_sos_group_without_marker_rejected() {
        let err = read_str("min\n o: x\nsos\n g1: x: 1\nend\n").unwrap_err();
        assert!(matches!(err, LpError::Structural(_)));
    }

    #[test]
    fn test_bad_quadratic_exponent_rejected() {
        let err = read_str("min\n o: [ x ^ 3 ] / 2\nend\n").unwrap_err();
        assert!(matches!(err, LpError::Semantic(_)));
    }

    #[test]
    fn test_unclosed_quadratic_block_rejected() {
        let err = read_str("min\n o: [ x ^ 2\nend\n").unwrap_err();
        assert!(matches!(err, LpError::Structural(_)));
    }
}
