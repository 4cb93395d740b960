//! Path query engine over untyped JSON documents.
//!
//! The ECB response carries a variable number of dated observations under a
//! single series header, so it is decoded by querying paths rather than by
//! deserializing into fixed structs. The supported grammar is a small jq
//! subset:
//!
//! ```text
//! query   := stage ( '|' stage )*
//! stage   := path | 'select(' path '==' literal ')' | 'length'
//! path    := '.' segment*            e.g. .structure.dimensions.series[]
//! segment := name | "quoted name" | [N] | []
//! literal := JSON string, number, true, false, null
//! ```
//!
//! A stage maps every input value to zero or more outputs. Field access on a
//! missing key (or on `null`) yields `null`, and out-of-range indexing yields
//! `null`, as in jq. [`PathQuery::evaluate_one`] then insists on exactly one
//! non-null result. Queries are index-agnostic: callers substitute indices
//! into the query text before parsing.

use std::borrow::Cow;

use mp_core::error::MpError;
use serde_json::Value;
use thiserror::Error;

static NULL: Value = Value::Null;

/// Errors from parsing or evaluating a path query.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("cannot parse query <{query}> at offset {pos}: {reason}")]
    Parse { query: String, pos: usize, reason: String },

    #[error("query returns no result: <{query}>")]
    NoResult { query: String },

    #[error("query result is null: <{query}>")]
    Absent { query: String },

    #[error("query returns {count} results, expected one: <{query}>")]
    Ambiguous { query: String, count: usize },

    #[error("query <{query}> failed: {reason}")]
    Type { query: String, reason: String },
}

impl From<QueryError> for MpError {
    fn from(e: QueryError) -> Self {
        MpError::Decode(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Field(String),
    Index(usize),
    Iterate,
}

#[derive(Debug, Clone, PartialEq)]
enum Stage {
    Path(Vec<Segment>),
    Select { path: Vec<Segment>, literal: Value },
    Length,
}

/// A parsed, reusable path query.
#[derive(Debug, Clone, PartialEq)]
pub struct PathQuery {
    source: String,
    stages: Vec<Stage>,
}

impl PathQuery {
    /// Parse a query expression.
    pub fn parse(expr: &str) -> Result<Self, QueryError> {
        let mut p = Parser { src: expr, pos: 0 };
        let mut stages = vec![p.stage()?];
        loop {
            p.skip_ws();
            if p.eof() {
                break;
            }
            p.expect('|')?;
            stages.push(p.stage()?);
        }
        Ok(Self { source: expr.to_string(), stages })
    }

    /// Run the query and return every output, in order.
    pub fn evaluate<'a>(&self, doc: &'a Value) -> Result<Vec<Cow<'a, Value>>, QueryError> {
        let mut current = vec![Cow::Borrowed(doc)];
        for stage in &self.stages {
            let mut next = Vec::with_capacity(current.len());
            for input in current {
                self.apply(stage, input, &mut next)?;
            }
            current = next;
        }
        Ok(current)
    }

    /// Run the query and require exactly one non-null output.
    pub fn evaluate_one<'a>(&self, doc: &'a Value) -> Result<Cow<'a, Value>, QueryError> {
        let mut results = self.evaluate(doc)?;
        match results.len() {
            0 => Err(QueryError::NoResult { query: self.source.clone() }),
            1 => match results.pop() {
                Some(v) if !v.is_null() => Ok(v),
                _ => Err(QueryError::Absent { query: self.source.clone() }),
            },
            count => Err(QueryError::Ambiguous { query: self.source.clone(), count }),
        }
    }

    fn apply<'a>(
        &self,
        stage: &Stage,
        input: Cow<'a, Value>,
        out: &mut Vec<Cow<'a, Value>>,
    ) -> Result<(), QueryError> {
        match stage {
            Stage::Path(segments) => match input {
                Cow::Borrowed(v) => out.extend(self.walk(v, segments)?.into_iter().map(Cow::Borrowed)),
                Cow::Owned(v) => out.extend(self.walk(&v, segments)?.into_iter().map(|r| Cow::Owned(r.clone()))),
            },
            Stage::Select { path, literal } => {
                let matched = self.walk(input.as_ref(), path)?.into_iter().any(|v| json_eq(v, literal));
                if matched {
                    out.push(input);
                }
            }
            Stage::Length => {
                let len = match input.as_ref() {
                    Value::Array(a) => a.len(),
                    Value::Object(m) => m.len(),
                    Value::String(s) => s.chars().count(),
                    Value::Null => 0,
                    other => return Err(self.type_error(format!("{} has no length", kind(other)))),
                };
                out.push(Cow::Owned(Value::from(len)));
            }
        }
        Ok(())
    }

    fn walk<'b>(&self, root: &'b Value, segments: &[Segment]) -> Result<Vec<&'b Value>, QueryError> {
        let mut current = vec![root];
        for segment in segments {
            let mut next = Vec::with_capacity(current.len());
            for v in current {
                match (segment, v) {
                    (Segment::Field(name), Value::Object(m)) => next.push(m.get(name).unwrap_or(&NULL)),
                    (Segment::Index(i), Value::Array(a)) => next.push(a.get(*i).unwrap_or(&NULL)),
                    (Segment::Field(_) | Segment::Index(_), Value::Null) => next.push(&NULL),
                    (Segment::Iterate, Value::Array(a)) => next.extend(a.iter()),
                    (Segment::Iterate, Value::Object(m)) => next.extend(m.values()),
                    (Segment::Field(name), other) => {
                        return Err(self.type_error(format!("cannot index {} with \"{name}\"", kind(other))));
                    }
                    (Segment::Index(i), other) => {
                        return Err(self.type_error(format!("cannot index {} with {i}", kind(other))));
                    }
                    (Segment::Iterate, other) => {
                        return Err(self.type_error(format!("cannot iterate over {}", kind(other))));
                    }
                }
            }
            current = next;
        }
        Ok(current)
    }

    fn type_error(&self, reason: String) -> QueryError {
        QueryError::Type { query: self.source.clone(), reason }
    }
}

/// Parse `expr` and evaluate it against `doc`, requiring exactly one result.
pub fn query_one<'a>(doc: &'a Value, expr: &str) -> Result<Cow<'a, Value>, QueryError> {
    PathQuery::parse(expr)?.evaluate_one(doc)
}

/// Equality as jq sees it: numbers compare by value, so `2` equals `2.0`.
fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser<'s> {
    src: &'s str,
    pos: usize,
}

impl Parser<'_> {
    fn eof(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn rest(&self) -> &str {
        &self.src[self.pos..]
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn error(&self, reason: impl Into<String>) -> QueryError {
        QueryError::Parse { query: self.src.to_string(), pos: self.pos, reason: reason.into() }
    }

    fn expect(&mut self, c: char) -> Result<(), QueryError> {
        self.skip_ws();
        if self.rest().starts_with(c) {
            self.pos += c.len_utf8();
            Ok(())
        } else {
            Err(self.error(format!("expected '{c}'")))
        }
    }

    /// Consume `word` if it is next and not followed by an identifier char.
    fn keyword(&mut self, word: &str) -> bool {
        let rest = self.rest();
        let boundary = rest.as_bytes().get(word.len()).is_none_or(|b| !is_ident_byte(*b));
        if rest.starts_with(word) && boundary {
            self.pos += word.len();
            true
        } else {
            false
        }
    }

    fn stage(&mut self) -> Result<Stage, QueryError> {
        self.skip_ws();
        if self.keyword("length") {
            return Ok(Stage::Length);
        }
        if self.keyword("select") {
            self.expect('(')?;
            self.skip_ws();
            let path = self.path()?;
            self.skip_ws();
            if !self.rest().starts_with("==") {
                return Err(self.error("expected '=='"));
            }
            self.pos += 2;
            let literal = self.literal()?;
            self.expect(')')?;
            return Ok(Stage::Select { path, literal });
        }
        if self.peek() == Some(b'.') {
            return Ok(Stage::Path(self.path()?));
        }
        Err(self.error("expected a path, select(...) or length"))
    }

    fn path(&mut self) -> Result<Vec<Segment>, QueryError> {
        if self.peek() != Some(b'.') {
            return Err(self.error("path must start with '.'"));
        }
        self.pos += 1;
        let mut segments = Vec::new();

        // Segment directly after the leading dot is optional (`.` is identity).
        match self.peek() {
            Some(b'"') => segments.push(Segment::Field(self.quoted()?)),
            Some(b'[') => segments.push(self.bracket()?),
            Some(b) if is_ident_start(b) => segments.push(Segment::Field(self.ident())),
            _ => return Ok(segments),
        }

        loop {
            match self.peek() {
                Some(b'[') => segments.push(self.bracket()?),
                Some(b'.') => {
                    self.pos += 1;
                    match self.peek() {
                        Some(b'"') => segments.push(Segment::Field(self.quoted()?)),
                        Some(b'[') => segments.push(self.bracket()?),
                        Some(b) if is_ident_start(b) => segments.push(Segment::Field(self.ident())),
                        _ => return Err(self.error("expected a field name after '.'")),
                    }
                }
                _ => return Ok(segments),
            }
        }
    }

    fn ident(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_byte) {
            self.pos += 1;
        }
        self.src[start..self.pos].to_string()
    }

    fn bracket(&mut self) -> Result<Segment, QueryError> {
        self.expect('[')?;
        self.skip_ws();
        if self.peek() == Some(b']') {
            self.pos += 1;
            return Ok(Segment::Iterate);
        }
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        let index = self.src[start..self.pos].parse::<usize>().map_err(|_| self.error("expected an array index"))?;
        self.expect(']')?;
        Ok(Segment::Index(index))
    }

    /// Read a JSON string literal, handling escapes via serde_json.
    fn quoted(&mut self) -> Result<String, QueryError> {
        let start = self.pos;
        self.pos += 1; // opening quote
        let mut escaped = false;
        while let Some(b) = self.peek() {
            self.pos += 1;
            match b {
                b'\\' if !escaped => escaped = true,
                b'"' if !escaped => {
                    return serde_json::from_str(&self.src[start..self.pos]).map_err(|e| self.error(e.to_string()));
                }
                _ => escaped = false,
            }
        }
        Err(self.error("unterminated string"))
    }

    fn literal(&mut self) -> Result<Value, QueryError> {
        self.skip_ws();
        if self.peek() == Some(b'"') {
            return self.quoted().map(Value::String);
        }
        let start = self.pos;
        while self.peek().is_some_and(|b| b != b')' && !b.is_ascii_whitespace()) {
            self.pos += 1;
        }
        let token = &self.src[start..self.pos];
        serde_json::from_str(token).map_err(|_| self.error(format!("invalid literal '{token}'")))
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn doc() -> Value {
        json!({
            "header": { "sender": { "id": "ECB" } },
            "dataSets": [{
                "series": { "0:0:0:0:0": { "observations": { "0": [1.5, 0], "1": [1.6, 0] } } }
            }],
            "structure": {
                "dimensions": {
                    "series": [
                        { "id": "FREQ", "values": [{ "id": "D" }] },
                        { "id": "CURRENCY", "values": [{ "id": "AUD" }] }
                    ]
                }
            },
            "tags": ["a", "b"]
        })
    }

    #[test]
    fn scalar_present_once() {
        let d = doc();
        assert_eq!(query_one(&d, ".header.sender.id").unwrap().as_ref(), "ECB");
    }

    #[test]
    fn absent_field_fails() {
        let d = doc();
        let err = query_one(&d, ".header.receiver.id").unwrap_err();
        assert!(matches!(err, QueryError::Absent { .. }));
    }

    #[test]
    fn multiple_matches_fail() {
        let d = doc();
        let err = query_one(&d, ".structure.dimensions.series[].id").unwrap_err();
        assert_eq!(err, QueryError::Ambiguous { query: ".structure.dimensions.series[].id".into(), count: 2 });
    }

    #[test]
    fn select_narrows_to_one() {
        let d = doc();
        let q = r#".structure.dimensions.series[] | select(.id == "CURRENCY") | .values[0].id"#;
        assert_eq!(query_one(&d, q).unwrap().as_ref(), "AUD");
    }

    #[test]
    fn select_without_match_is_no_result() {
        let d = doc();
        let q = r#".structure.dimensions.series[] | select(.id=="EXR_TYPE") | .values[0].id"#;
        assert!(matches!(query_one(&d, q).unwrap_err(), QueryError::NoResult { .. }));
    }

    #[test]
    fn quoted_keys_and_index() {
        let d = doc();
        let q = r#".dataSets[0].series."0:0:0:0:0".observations."1"[0]"#;
        assert_eq!(query_one(&d, q).unwrap().as_f64(), Some(1.6));
    }

    #[test]
    fn length_of_object_and_array() {
        let d = doc();
        let q = r#".dataSets[].series."0:0:0:0:0".observations | length"#;
        assert_eq!(query_one(&d, q).unwrap().as_u64(), Some(2));
        assert_eq!(query_one(&d, ".tags | length").unwrap().as_u64(), Some(2));
    }

    #[test]
    fn out_of_range_index_is_absent() {
        let d = doc();
        assert!(matches!(query_one(&d, ".tags[5]").unwrap_err(), QueryError::Absent { .. }));
    }

    #[test]
    fn iterate_over_scalar_is_type_error() {
        let d = doc();
        assert!(matches!(query_one(&d, ".header.sender.id[]").unwrap_err(), QueryError::Type { .. }));
    }

    #[test]
    fn identity_returns_document() {
        let d = json!(42);
        assert_eq!(query_one(&d, ".").unwrap().as_u64(), Some(42));
    }

    #[test]
    fn numeric_and_bool_literals() {
        let d = json!({ "rows": [{ "n": 1, "ok": true, "v": "x" }, { "n": 2, "ok": false, "v": "y" }] });
        assert_eq!(query_one(&d, ".rows[] | select(.n == 2) | .v").unwrap().as_ref(), "y");
        assert_eq!(query_one(&d, ".rows[] | select(.ok == true) | .v").unwrap().as_ref(), "x");
    }

    #[test]
    fn select_compares_numbers_by_value() {
        let floats = json!({ "rows": [{ "n": 2.0, "v": "y" }] });
        assert_eq!(query_one(&floats, ".rows[] | select(.n == 2) | .v").unwrap().as_ref(), "y");

        let ints = json!({ "rows": [{ "n": 1, "v": "x" }, { "n": 2, "v": "y" }] });
        assert_eq!(query_one(&ints, ".rows[] | select(.n == 2.0) | .v").unwrap().as_ref(), "y");
        assert!(matches!(
            query_one(&ints, ".rows[] | select(.n == 2.5) | .v").unwrap_err(),
            QueryError::NoResult { .. }
        ));
    }

    #[test]
    fn parse_errors() {
        let bad_queries = [
            "",
            "header",
            ".a |",
            ".a[x]",
            r#".a."unterminated"#,
            ".a | select(.b = 1)",
            ".a.",
            ".a | select(.b == nope)",
        ];
        for bad in bad_queries {
            assert!(matches!(PathQuery::parse(bad), Err(QueryError::Parse { .. })), "{bad} should not parse");
        }
    }

    #[test]
    fn parsed_query_is_reusable() {
        let q = PathQuery::parse(".header.sender.id").unwrap();
        let a = json!({ "header": { "sender": { "id": "A" } } });
        let b = json!({ "header": { "sender": { "id": "B" } } });
        assert_eq!(q.evaluate_one(&a).unwrap().as_ref(), "A");
        assert_eq!(q.evaluate_one(&b).unwrap().as_ref(), "B");
    }

    #[test]
    fn decode_error_conversion() {
        let err: MpError = QueryError::NoResult { query: ".x".into() }.into();
        assert!(matches!(err, MpError::Decode(_)));
    }
}
