//! Path expression evaluator.
//!
//! An attribute path is a list of dot-separated segments, each optionally
//! followed by one or more `[index]` markers:
//!
//! ```text
//! name.first          map lookups
//! tags[2]             index into the sequence at "tags"
//! [0].id              root is a sequence
//! matrix[1][3]        nested sequences
//! tags[]              append (writes only, last marker only)
//! ```
//!
//! Reads never fail on a miss: a missing key, an out-of-range index or a
//! lookup through the wrong container kind all yield "no value". Writes
//! create the intermediate maps and sequences the path asks for.

use crate::coerce::{coerce, kind_name, TargetType};
use crate::error::{BoError, BoResult};
use serde_json::{Map, Value};

/// Largest number of `null` slots one indexed write may pad a sequence with.
///
/// Writing `a[i]` where `i` lies further than this past the end of `a` is
/// rejected as a malformed path instead of allocating the gap.
pub const MAX_SEQUENCE_GROWTH: usize = 1 << 16;

/// One step of a parsed attribute path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathToken {
    /// Map lookup by key.
    Key(String),
    /// Sequence lookup by zero-based position.
    Index(usize),
    /// Append a new slot to a sequence (`[]`).
    Append,
}

/// Parses an attribute path into tokens.
///
/// # Errors
///
/// Returns [`BoError::MalformedPath`] when the path is empty, has an empty
/// segment, an unclosed or stray bracket, a non-numeric index, or an append
/// marker anywhere but the very end.
pub fn parse(path: &str) -> BoResult<Vec<PathToken>> {
    if path.is_empty() {
        return Err(BoError::malformed(path, "empty path"));
    }

    let mut tokens = Vec::new();
    for (position, segment) in path.split('.').enumerate() {
        let (name, mut rest) = match segment.find('[') {
            Some(open) => segment.split_at(open),
            None => (segment, ""),
        };

        if name.contains(']') {
            return Err(BoError::malformed(path, "']' without matching '['"));
        }
        if name.is_empty() {
            // Only the very first segment may omit its name, and only to
            // address a sequence root.
            if position != 0 || rest.is_empty() {
                return Err(BoError::malformed(path, "empty segment"));
            }
        } else {
            tokens.push(PathToken::Key(name.to_string()));
        }

        while !rest.is_empty() {
            let close = rest
                .find(']')
                .ok_or_else(|| BoError::malformed(path, "unclosed '['"))?;
            let inner = &rest[1..close];
            if inner.is_empty() {
                tokens.push(PathToken::Append);
            } else if inner.bytes().all(|b| b.is_ascii_digit()) {
                let index = inner
                    .parse::<usize>()
                    .map_err(|_| BoError::malformed(path, format!("index {inner} out of range")))?;
                tokens.push(PathToken::Index(index));
            } else {
                return Err(BoError::malformed(
                    path,
                    format!("invalid index {inner:?}"),
                ));
            }

            rest = &rest[close + 1..];
            if !rest.is_empty() && !rest.starts_with('[') {
                return Err(BoError::malformed(path, "unexpected text after ']'"));
            }
        }
    }

    if let Some(pos) = tokens.iter().position(|t| *t == PathToken::Append) {
        if pos + 1 != tokens.len() {
            return Err(BoError::malformed(path, "'[]' must be the last marker"));
        }
    }

    Ok(tokens)
}

/// Follows already-parsed tokens from `root`, returning the addressed value.
pub fn lookup<'a>(root: &'a Value, tokens: &[PathToken]) -> Option<&'a Value> {
    tokens
        .iter()
        .try_fold(root, |current, token| match (token, current) {
            (PathToken::Key(key), Value::Object(map)) => map.get(key),
            (PathToken::Index(index), Value::Array(items)) => items.get(*index),
            _ => None,
        })
}

/// Reads the value at `path`, optionally converting it to `target`.
///
/// A missing value (or a JSON `null` leaf) is `Ok(None)`.
///
/// # Errors
///
/// Returns an error if the path is malformed, contains an append marker,
/// or the value cannot be converted to `target`.
pub fn get(root: &Value, path: &str, target: Option<TargetType>) -> BoResult<Option<Value>> {
    let tokens = parse(path)?;
    if tokens.contains(&PathToken::Append) {
        return Err(BoError::malformed(path, "'[]' is only valid when writing"));
    }

    match lookup(root, &tokens) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => match target {
            None => Ok(Some(value.clone())),
            Some(target) => coerce(value, target).map(Some),
        },
    }
}

/// Writes `value` at `path`, creating intermediate containers.
///
/// A `null` container on the way is replaced by the map or sequence the
/// next token needs. Sequences grow to the addressed index, padding new
/// slots with `null`.
///
/// # Errors
///
/// Returns [`BoError::MalformedPath`] for invalid syntax and
/// [`BoError::PathConflict`] when a non-null value of the wrong kind sits
/// where a container is needed.
pub fn set(root: &mut Value, path: &str, value: Value) -> BoResult<()> {
    let tokens = parse(path)?;
    check_growth(root, &tokens, path)?;
    let mut current = root;
    for token in &tokens {
        current = descend(current, token, path)?;
    }
    *current = value;
    Ok(())
}

fn descend<'a>(current: &'a mut Value, token: &PathToken, path: &str) -> BoResult<&'a mut Value> {
    match token {
        PathToken::Key(key) => {
            if current.is_null() {
                *current = Value::Object(Map::new());
            }
            match current {
                Value::Object(map) => Ok(map.entry(key.clone()).or_insert(Value::Null)),
                other => Err(conflict(path, other)),
            }
        }
        PathToken::Index(index) => {
            if current.is_null() {
                *current = Value::Array(Vec::new());
            }
            match current {
                Value::Array(items) => {
                    let index = *index;
                    if items.len() <= index {
                        items.resize(grown_len(items.len(), index, path)?, Value::Null);
                    }
                    Ok(&mut items[index])
                }
                other => Err(conflict(path, other)),
            }
        }
        PathToken::Append => {
            if current.is_null() {
                *current = Value::Array(Vec::new());
            }
            match current {
                Value::Array(items) => {
                    let slot = items.len();
                    items.push(Value::Null);
                    Ok(&mut items[slot])
                }
                other => Err(conflict(path, other)),
            }
        }
    }
}

/// Length a sequence of `len` items must reach so that `index` exists.
fn grown_len(len: usize, index: usize, path: &str) -> BoResult<usize> {
    match index.checked_add(1) {
        Some(new_len) if index.saturating_sub(len) <= MAX_SEQUENCE_GROWTH => Ok(new_len),
        _ => Err(BoError::malformed(
            path,
            format!("index {index} is more than {MAX_SEQUENCE_GROWTH} past the end of a sequence of {len}"),
        )),
    }
}

// Rejects oversized indices before `descend` starts creating containers,
// so a refused write leaves the root untouched.
fn check_growth(root: &Value, tokens: &[PathToken], path: &str) -> BoResult<()> {
    let mut current = Some(root);
    for token in tokens {
        current = match (current, token) {
            (Some(Value::Object(map)), PathToken::Key(key)) => map.get(key),
            (Some(Value::Array(items)), PathToken::Index(index)) => {
                grown_len(items.len(), *index, path)?;
                items.get(*index)
            }
            (None | Some(Value::Null), PathToken::Index(index)) => {
                grown_len(0, *index, path)?;
                None
            }
            (None | Some(Value::Null | Value::Array(_)), PathToken::Append)
            | (None | Some(Value::Null), PathToken::Key(_)) => None,
            // A kind mismatch is reported by `descend`.
            _ => return Ok(()),
        };
    }
    Ok(())
}

fn conflict(path: &str, found: &Value) -> BoError {
    BoError::PathConflict {
        path: path.to_string(),
        found: kind_name(found),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_dotted_and_indexed() {
        let tokens = parse("a.b[2][0].c").unwrap();
        assert_eq!(
            tokens,
            vec![
                PathToken::Key("a".into()),
                PathToken::Key("b".into()),
                PathToken::Index(2),
                PathToken::Index(0),
                PathToken::Key("c".into()),
            ]
        );
    }

    #[test]
    fn parse_root_index_and_append() {
        assert_eq!(
            parse("[1].x").unwrap(),
            vec![PathToken::Index(1), PathToken::Key("x".into())]
        );
        assert_eq!(
            parse("x[]").unwrap(),
            vec![PathToken::Key("x".into()), PathToken::Append]
        );
    }

    #[test]
    fn parse_rejects_malformed() {
        for bad in [
            "", "a..b", ".a", "a.", "a[", "a[1", "a]", "a[x]", "a[-1]", "a[1]b", "a[].b",
            "a[][0]", "a.[0]", "[+1]",
        ] {
            assert!(
                matches!(parse(bad), Err(BoError::MalformedPath { .. })),
                "expected {bad:?} to be malformed"
            );
        }
    }

    #[test]
    fn get_missing_is_none() {
        let root = json!({"a": {"b": [1, 2]}});
        assert_eq!(get(&root, "a.c", None).unwrap(), None);
        assert_eq!(get(&root, "a.b[5]", None).unwrap(), None);
        assert_eq!(get(&root, "a.b.c", None).unwrap(), None);
        assert_eq!(get(&root, "a[0]", None).unwrap(), None);
        assert_eq!(get(&Value::Null, "x", None).unwrap(), None);
    }

    #[test]
    fn get_null_leaf_is_none() {
        let root = json!({"a": null});
        assert_eq!(get(&root, "a", None).unwrap(), None);
    }

    #[test]
    fn get_with_target_coerces() {
        let root = json!({"n": "42"});
        assert_eq!(
            get(&root, "n", Some(TargetType::I64)).unwrap(),
            Some(json!(42))
        );
        assert!(matches!(
            get(&root, "n", Some(TargetType::Map)),
            Err(BoError::Coercion { .. })
        ));
    }

    #[test]
    fn get_rejects_append_marker() {
        let root = json!({"x": [1]});
        assert!(get(&root, "x[]", None).is_err());
    }

    #[test]
    fn set_creates_maps_and_sequences() {
        let mut root = Value::Null;
        set(&mut root, "a.b[2].c", json!("v")).unwrap();
        assert_eq!(root, json!({"a": {"b": [null, null, {"c": "v"}]}}));
    }

    #[test]
    fn set_root_index_makes_sequence() {
        let mut root = Value::Null;
        set(&mut root, "[1]", json!(true)).unwrap();
        assert_eq!(root, json!([null, true]));
    }

    #[test]
    fn set_append() {
        let mut root = json!({"x": [1]});
        set(&mut root, "x[]", json!(2)).unwrap();
        set(&mut root, "y[]", json!("first")).unwrap();
        assert_eq!(root, json!({"x": [1, 2], "y": ["first"]}));
    }

    #[test]
    fn set_overwrites_leaf_and_null_container() {
        let mut root = json!({"a": null, "b": 1});
        set(&mut root, "a.k", json!(1)).unwrap();
        set(&mut root, "b", json!("two")).unwrap();
        assert_eq!(root, json!({"a": {"k": 1}, "b": "two"}));
    }

    #[test]
    fn set_through_scalar_conflicts() {
        let mut root = json!({"a": 5});
        let err = set(&mut root, "a.b", json!(1)).unwrap_err();
        assert!(matches!(err, BoError::PathConflict { found: "number", .. }));
        assert_eq!(root, json!({"a": 5}));
    }

    #[test]
    fn set_index_on_map_root_conflicts() {
        let mut root = json!({"a": 1});
        assert!(matches!(
            set(&mut root, "[0]", json!(1)),
            Err(BoError::PathConflict { .. })
        ));
    }

    #[test]
    fn set_far_past_end_is_rejected() {
        let mut root = json!({"a": [1]});
        for bad in ["a[18446744073709551615]", "a[4000000000]", "b[65537]"] {
            assert!(
                matches!(set(&mut root, bad, json!(1)), Err(BoError::MalformedPath { .. })),
                "expected {bad:?} to be rejected"
            );
        }
        assert_eq!(root, json!({"a": [1]}));
    }

    #[test]
    fn set_grows_up_to_the_limit() {
        let mut root = Value::Null;
        set(&mut root, &format!("[{MAX_SEQUENCE_GROWTH}]"), json!(1)).unwrap();
        assert_eq!(root.as_array().map(Vec::len), Some(MAX_SEQUENCE_GROWTH + 1));
    }

    #[test]
    fn set_then_get_round_trip() {
        let mut root = Value::Null;
        set(&mut root, "m.n[3]", json!(7.5)).unwrap();
        assert_eq!(
            get(&root, "m.n[3]", Some(TargetType::F64)).unwrap(),
            Some(json!(7.5))
        );
    }
}
