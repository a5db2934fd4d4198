//! Decoding of untyped ledger payloads into domain types.
//!
//! Ledger clients hand back loosely shaped JSON (what a generic ABI decoder
//! produces). Nothing here trusts that shape: every field is checked and a
//! mismatch becomes a [`DecodeError`].

use serde_json::{Map, Value};

use crate::{
    domain::{Candidate, Identity},
    error::DecodeError,
};

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn unexpected(expected: &'static str, value: &Value) -> DecodeError {
    DecodeError::UnexpectedType {
        expected,
        actual: type_name(value),
    }
}

/// Accepts a JSON number or a decimal string (large integers usually arrive
/// as strings).
pub fn decode_u64(value: &Value) -> Result<u64, DecodeError> {
    match value {
        Value::Number(number) => number
            .as_u64()
            .ok_or_else(|| DecodeError::OutOfRange(number.to_string())),
        Value::String(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
                return Err(DecodeError::OutOfRange(raw.clone()));
            }
            trimmed
                .parse::<u64>()
                .map_err(|_| DecodeError::OutOfRange(raw.clone()))
        }
        other => Err(unexpected("unsigned integer", other)),
    }
}

pub fn decode_bool(value: &Value) -> Result<bool, DecodeError> {
    value.as_bool().ok_or_else(|| unexpected("bool", value))
}

pub fn decode_identity(value: &Value) -> Result<Identity, DecodeError> {
    let raw = value.as_str().ok_or_else(|| unexpected("string", value))?;
    if raw.trim().is_empty() {
        return Err(DecodeError::EmptyIdentity);
    }
    Ok(Identity::new(raw))
}

fn decode_candidate_object(object: &Map<String, Value>) -> Result<Candidate, DecodeError> {
    let name = object
        .get("name")
        .ok_or(DecodeError::MissingField("name"))?;
    let name = name.as_str().ok_or_else(|| unexpected("string", name))?;
    let vote_count = object
        .get("voteCount")
        .or_else(|| object.get("vote_count"))
        .ok_or(DecodeError::MissingField("voteCount"))?;
    Ok(Candidate::new(name, decode_u64(vote_count)?))
}

fn decode_candidate(value: &Value) -> Result<Candidate, DecodeError> {
    match value {
        Value::Object(object) => decode_candidate_object(object),
        // Positional tuple form: [name, voteCount].
        Value::Array(items) if items.len() == 2 => {
            let name = items[0]
                .as_str()
                .ok_or_else(|| unexpected("string", &items[0]))?;
            Ok(Candidate::new(name, decode_u64(&items[1])?))
        }
        other => Err(unexpected("candidate object", other)),
    }
}

pub fn decode_candidates(value: &Value) -> Result<Vec<Candidate>, DecodeError> {
    let items = value.as_array().ok_or_else(|| unexpected("array", value))?;
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            decode_candidate(item).map_err(|source| DecodeError::Candidate {
                index,
                source: Box::new(source),
            })
        })
        .collect()
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
