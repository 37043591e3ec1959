//! Property-based tests for content-model compilation and matching

use contentmodel::{compact, Grammar, ElementDecl, InsertSide, Limits, Pattern, Schema, Token};
use proptest::prelude::*;

const NAMES: [&str; 4] = ["a", "b", "c", "#text"];

fn leaf() -> impl Strategy<Value = Pattern> {
    prop::sample::select(NAMES.to_vec()).prop_map(Pattern::token)
}

/// Interleave-free patterns over a small alphabet
fn pattern() -> impl Strategy<Value = Pattern> {
    leaf().prop_recursive(4, 24, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Pattern::sequence),
            prop::collection::vec(inner.clone(), 1..4).prop_map(Pattern::choice),
            inner.clone().prop_map(Pattern::optional),
            inner.clone().prop_map(Pattern::kleene),
            inner.prop_map(Pattern::plus),
        ]
    })
}

fn word() -> impl Strategy<Value = Vec<Token>> {
    prop::collection::vec(prop::sample::select(NAMES.to_vec()).prop_map(Token::from_name), 0..6)
}

fn compile(pattern: &Pattern) -> Option<Schema> {
    let grammar = Grammar::new().element("root", ElementDecl::new(pattern.clone()));
    Schema::from_grammar(&grammar, Limits::default()).ok()
}

proptest! {
    #[test]
    fn normalize_is_idempotent(p in pattern()) {
        if let Ok(once) = p.normalize() {
            prop_assert_eq!(once.clone().normalize().ok(), Some(once));
        }
    }

    #[test]
    fn compilation_is_deterministic(p in pattern()) {
        let (Some(first), Some(second)) = (compile(&p), compile(&p)) else {
            return Ok(());
        };
        prop_assert_eq!(compact::encode(&first), compact::encode(&second));
    }

    #[test]
    fn validate_agrees_with_accepts(p in pattern(), w in word()) {
        let Some(schema) = compile(&p) else {
            return Ok(());
        };
        let expr = schema.element_schema("root").unwrap().expression();
        prop_assert_eq!(expr.validate(&w).is_empty(), expr.accepts(&w));
    }

    #[test]
    fn accepted_words_use_allowed_tokens(p in pattern(), w in word()) {
        let Some(schema) = compile(&p) else {
            return Ok(());
        };
        let expr = schema.element_schema("root").unwrap().expression();
        if expr.accepts(&w) {
            prop_assert!(w.iter().all(|t| expr.is_allowed(t)));
        }
    }

    #[test]
    fn compact_round_trip_preserves_language(p in pattern(), w in word()) {
        let Some(schema) = compile(&p) else {
            return Ok(());
        };
        let decoded = compact::decode_value(&compact::encode(&schema)).unwrap();
        let before = schema.element_schema("root").unwrap().expression();
        let after = decoded.element_schema("root").unwrap().expression();
        prop_assert_eq!(before.accepts(&w), after.accepts(&w));
        prop_assert_eq!(before.is_text_allowed(), after.is_text_allowed());
    }

    #[test]
    fn insert_position_yields_valid_content(p in pattern(), w in word(), name in prop::sample::select(NAMES.to_vec())) {
        let Some(schema) = compile(&p) else {
            return Ok(());
        };
        let expr = schema.element_schema("root").unwrap().expression();
        if !expr.accepts(&w) {
            return Ok(());
        }
        let token = Token::from_name(name);
        for side in [InsertSide::First, InsertSide::Last] {
            if let Some(pos) = expr.find_insert_pos(&w, &token, side) {
                let mut inserted = w.clone();
                inserted.insert(pos, token.clone());
                prop_assert!(expr.accepts(&inserted));
            }
        }
    }
}
