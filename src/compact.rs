//! Compact JSON encoding of compiled schemas
//!
//! Compiling a grammar is the expensive part of loading a schema, so a
//! compiled [`Schema`] can be shipped in a compact form and rebuilt without
//! the compiler:
//!
//! ```text
//! [tagNames[], attributeNames[], perElement[typeCode, attributeIndices[], dfa], startIndex?]
//! ```
//!
//! `perElement[i]` declares `tagNames[i]`; names past the last declaration
//! are referenced by content models without being declared. A `dfa` maps
//! state codes (`"S"`, `"E"` or integers) to objects mapping token codes
//! (`"T"` for text, `"E"` for epsilon, or a tag index) to target state
//! codes. An interleave is encoded as an array of such objects.

use indexmap::{IndexMap, IndexSet};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Error, Result};
use crate::validators::ast::Token;
use crate::validators::automaton::{Automaton, Label, State};
use crate::validators::elements::{ElementKind, ElementSchema};
use crate::validators::expressions::Expression;
use crate::validators::schemas::Schema;

const START_CODE: &str = "S";
const END_CODE: &str = "E";
const TEXT_CODE: &str = "T";
const EPSILON_CODE: &str = "E";

/// Encode a schema as a JSON value
pub fn encode(schema: &Schema) -> Value {
    let mut tags: IndexSet<&str> = schema.element_names().collect();
    let mut attributes: IndexSet<&str> = IndexSet::new();
    for element in schema.elements() {
        attributes.extend(element.attributes().iter().map(String::as_str));
        for token in element.expression().allowed_tokens() {
            if let Token::Element(name) = token {
                tags.insert(name.as_str());
            }
        }
    }

    let per_element: Vec<Value> = schema
        .elements()
        .map(|element| {
            let attribute_indices: Vec<Value> = element
                .attributes()
                .iter()
                .filter_map(|name| attributes.get_index_of(name.as_str()))
                .map(Value::from)
                .collect();
            let dfa = match element.expression() {
                Expression::Dfa(expr) => encode_automaton(expr.automaton(), &tags),
                Expression::Interleave(expr) => Value::Array(
                    expr.components()
                        .iter()
                        .map(|automaton| encode_automaton(automaton, &tags))
                        .collect(),
                ),
            };
            Value::Array(vec![
                Value::from(element.kind().code()),
                Value::Array(attribute_indices),
                dfa,
            ])
        })
        .collect();

    let mut encoded = vec![
        Value::Array(tags.iter().map(|t| Value::from(*t)).collect()),
        Value::Array(attributes.iter().map(|a| Value::from(*a)).collect()),
        Value::Array(per_element),
    ];
    if let Some(index) = schema.start().and_then(|start| tags.get_index_of(start)) {
        encoded.push(Value::from(index));
    }
    Value::Array(encoded)
}

/// Encode a schema as a JSON string
pub fn encode_to_string(schema: &Schema, pretty: bool) -> Result<String> {
    let value = encode(schema);
    let json = if pretty {
        serde_json::to_string_pretty(&value)?
    } else {
        serde_json::to_string(&value)?
    };
    Ok(json)
}

/// Decode a schema from a JSON string
pub fn decode(json: &str) -> Result<Schema> {
    let value: Value = serde_json::from_str(json)?;
    decode_value(&value)
}

/// Decode a schema from a JSON value
pub fn decode_value(value: &Value) -> Result<Schema> {
    let parts = as_array(value, "schema")?;
    if parts.len() != 3 && parts.len() != 4 {
        return Err(Error::Decode(format!(
            "schema must have 3 or 4 entries, found {}",
            parts.len()
        )));
    }

    let tags = string_list(&parts[0], "tag names")?;
    let attributes = string_list(&parts[1], "attribute names")?;
    let per_element = as_array(&parts[2], "element list")?;
    if per_element.len() > tags.len() {
        return Err(Error::Decode(format!(
            "{} element declarations for {} tag names",
            per_element.len(),
            tags.len()
        )));
    }

    let mut elements = IndexMap::with_capacity(per_element.len());
    for (index, entry) in per_element.iter().enumerate() {
        let name = &tags[index];
        let element = decode_element(name, entry, &tags, &attributes)
            .map_err(|e| Error::Decode(format!("element '{}': {}", name, decode_message(e))))?;
        elements.insert(name.clone(), element);
    }

    let start = match parts.get(3) {
        Some(Value::Null) | None => None,
        Some(index) => {
            let index = index_into(index, per_element.len(), "start index")?;
            Some(tags[index].clone())
        }
    };

    debug!(elements = elements.len(), "decoded compact schema");
    Ok(Schema::new(elements, start))
}

fn decode_message(error: Error) -> String {
    match error {
        Error::Decode(message) => message,
        other => other.to_string(),
    }
}

fn decode_element(name: &str, entry: &Value, tags: &[String], attributes: &[String]) -> Result<ElementSchema> {
    let fields = as_array(entry, "element")?;
    if fields.len() != 3 {
        return Err(Error::Decode(format!(
            "element entry must have 3 fields, found {}",
            fields.len()
        )));
    }

    let code = fields[0]
        .as_u64()
        .ok_or_else(|| Error::Decode("type code must be an integer".to_string()))?;
    let kind = ElementKind::from_code(code)
        .ok_or_else(|| Error::Decode(format!("unknown type code {}", code)))?;

    let mut allowed = IndexSet::new();
    for index in as_array(&fields[1], "attribute indices")? {
        let index = index_into(index, attributes.len(), "attribute index")?;
        allowed.insert(attributes[index].clone());
    }

    let expr = match &fields[2] {
        Value::Array(components) => Expression::interleave(
            components
                .iter()
                .map(|dfa| decode_automaton(dfa, tags))
                .collect::<Result<Vec<_>>>()?,
        ),
        dfa => Expression::dfa(decode_automaton(dfa, tags)?),
    };

    Ok(ElementSchema::new(name, kind, allowed, expr))
}

fn encode_automaton(automaton: &Automaton, tags: &IndexSet<&str>) -> Value {
    let mut numbering: IndexMap<State, usize> = IndexMap::new();
    for state in automaton.states() {
        if let State::Id(_) = state {
            let next = numbering.len();
            numbering.entry(state).or_insert(next);
        }
    }
    let state_code = |state: State| -> Value {
        match state {
            State::Start => Value::from(START_CODE),
            State::End => Value::from(END_CODE),
            State::Id(_) => Value::from(numbering.get(&state).copied().unwrap_or_default()),
        }
    };
    let key = |state: State| -> String {
        match state_code(state) {
            Value::String(s) => s,
            other => other.to_string(),
        }
    };

    let mut table = Map::new();
    for (from, edges) in automaton.transitions() {
        let mut row = Map::new();
        for (label, to) in edges {
            let code = match label {
                Label::Epsilon => EPSILON_CODE.to_string(),
                Label::Token(Token::Text) => TEXT_CODE.to_string(),
                Label::Token(Token::Element(name)) => match tags.get_index_of(name.as_str()) {
                    Some(index) => index.to_string(),
                    None => continue,
                },
            };
            row.insert(code, state_code(*to));
        }
        table.insert(key(*from), Value::Object(row));
    }
    Value::Object(table)
}

fn decode_automaton(value: &Value, tags: &[String]) -> Result<Automaton> {
    let table = value
        .as_object()
        .ok_or_else(|| Error::Decode("automaton must be an object".to_string()))?;

    let mut automaton = Automaton::new();
    for (from, row) in table {
        let from = decode_state(from)?;
        let row = row
            .as_object()
            .ok_or_else(|| Error::Decode(format!("transitions of {} must be an object", from)))?;
        for (code, target) in row {
            let label = match code.as_str() {
                EPSILON_CODE => Label::Epsilon,
                TEXT_CODE => Label::Token(Token::Text),
                index => {
                    let index: usize = index
                        .parse()
                        .map_err(|_| Error::Decode(format!("invalid token code '{}'", index)))?;
                    let name = tags
                        .get(index)
                        .ok_or_else(|| Error::Decode(format!("token code {} out of range", index)))?;
                    Label::Token(Token::element(name.as_str()))
                }
            };
            let target = match target {
                Value::String(code) => decode_state(code)?,
                Value::Number(n) => n
                    .as_u64()
                    .and_then(|id| u32::try_from(id).ok())
                    .map(State::Id)
                    .ok_or_else(|| Error::Decode(format!("invalid state code {}", n)))?,
                other => return Err(Error::Decode(format!("invalid state code {}", other))),
            };
            automaton.insert(from, label, target);
        }
    }

    let problems = automaton.check_invariants();
    if !problems.is_empty() {
        return Err(Error::Decode(format!(
            "malformed automaton: {}",
            problems.join("; ")
        )));
    }
    Ok(automaton)
}

fn decode_state(code: &str) -> Result<State> {
    match code {
        START_CODE => Ok(State::Start),
        END_CODE => Ok(State::End),
        id => id
            .parse::<u32>()
            .map(State::Id)
            .map_err(|_| Error::Decode(format!("invalid state code '{}'", id))),
    }
}

fn as_array<'v>(value: &'v Value, what: &str) -> Result<&'v Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| Error::Decode(format!("{} must be an array", what)))
}

fn string_list(value: &Value, what: &str) -> Result<Vec<String>> {
    as_array(value, what)?
        .iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| Error::Decode(format!("{} must be strings", what)))
        })
        .collect()
}

fn index_into(value: &Value, len: usize, what: &str) -> Result<usize> {
    value
        .as_u64()
        .and_then(|i| usize::try_from(i).ok())
        .filter(|i| *i < len)
        .ok_or_else(|| Error::Decode(format!("{} {} out of range", what, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::Limits;
    use crate::validators::ast::Pattern;
    use crate::validators::schemas::{ElementDecl, Grammar};
    use serde_json::json;

    fn schema() -> Schema {
        let grammar = Grammar::new()
            .start("doc")
            .element(
                "doc",
                ElementDecl::new(Pattern::sequence(vec![
                    Pattern::token("title"),
                    Pattern::optional(Pattern::text()),
                ]))
                .with_attributes(["id"]),
            )
            .element("title", ElementDecl::new(Pattern::kleene(Pattern::token("em"))))
            .element(
                "meta",
                ElementDecl::new(Pattern::interleave(vec![Pattern::token("a"), Pattern::token("b")])),
            );
        Schema::from_grammar(&grammar, Limits::default()).unwrap()
    }

    #[test]
    fn test_encode_layout() {
        let encoded = encode(&schema());
        assert_eq!(encoded[0], json!(["doc", "title", "meta", "em", "a", "b"]));
        assert_eq!(encoded[1], json!(["id"]));
        assert_eq!(encoded[2][0][0], json!(2));
        assert_eq!(encoded[2][0][1], json!([0]));
        assert_eq!(encoded[2][0][2]["S"]["1"], json!(0));
        assert_eq!(encoded[2][0][2]["0"]["T"], json!("E"));
        assert_eq!(encoded[2][0][2]["0"]["E"], json!("E"));
        assert!(encoded[2][2][2].is_array());
        assert_eq!(encoded[3], json!(0));
    }

    #[test]
    fn test_decode_hand_written() {
        // (item, #text?)
        let value = json!([
            ["list", "item"],
            ["n"],
            [[1, [0], {"S": {"1": 0}, "0": {"T": "E", "E": "E"}}]]
        ]);
        let schema = decode_value(&value).unwrap();
        let list = schema.element_schema("list").unwrap();
        assert_eq!(list.kind(), ElementKind::Element);
        assert!(list.has_attribute("n"));
        assert!(list.expression().accepts(&[Token::element("item")]));
        assert!(list.expression().accepts(&[Token::element("item"), Token::Text]));
        assert!(!list.expression().accepts(&[Token::Text]));
        assert!(schema.element_schema("item").is_none());
        assert_eq!(schema.start(), None);
    }

    #[test]
    fn test_decode_rejects_malformed() {
        let cases = [
            json!({"tags": []}),
            json!([["a"], [], [[9, [], {"S": {"E": "E"}}]]]),
            json!([["a"], [], [[0, [3], {"S": {"E": "E"}}]]]),
            json!([["a"], [], [[0, [], {"S": {"7": "E"}}]]]),
            json!([["a"], [], [[0, [], {"S": {"0": "S"}}]]]),
            json!([["a"], [], [[0, [], {"S": {"E": "E"}}]], 4]),
            json!([["a"], [], [[0, [], {"X": {"E": "E"}}]]]),
        ];
        for case in cases {
            assert!(
                matches!(decode_value(&case), Err(Error::Decode(_))),
                "accepted {}",
                case
            );
        }
    }

    #[test]
    fn test_round_trip_preserves_behaviour() {
        let original = schema();
        let json = encode_to_string(&original, false).unwrap();
        let decoded = decode(&json).unwrap();

        assert_eq!(decoded.start(), Some("doc"));
        assert_eq!(decoded.len(), original.len());
        let samples: [&[Token]; 4] = [
            &[Token::element("title")],
            &[Token::element("title"), Token::Text],
            &[Token::element("em"), Token::element("em")],
            &[Token::element("b"), Token::element("a")],
        ];
        for element in original.elements() {
            let copy = decoded.element_schema(element.name()).unwrap();
            assert_eq!(copy.kind(), element.kind());
            assert_eq!(copy.attributes(), element.attributes());
            for sample in samples {
                assert_eq!(
                    copy.expression().accepts(sample),
                    element.expression().accepts(sample)
                );
            }
        }
    }
}
