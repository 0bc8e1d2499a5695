//! Parsers for command-line values.

use bson::oid::ObjectId;
use bson::Bson;
use docstore::Direction;

/// Interpret a command-line literal as a BSON value.
///
/// 24 hex digits become an ObjectId, `true` / `false` a bool, `null` Null,
/// integers Int64 and other numbers Double. Everything else is a string; a
/// leading `'` forces the rest to be taken as a string verbatim.
pub fn parse_value(raw: &str) -> Bson {
    if let Some(text) = raw.strip_prefix('\'') {
        return Bson::String(text.to_string());
    }
    if raw.len() == 24 {
        if let Ok(oid) = ObjectId::parse_str(raw) {
            return Bson::ObjectId(oid);
        }
    }
    match raw {
        "true" => return Bson::Boolean(true),
        "false" => return Bson::Boolean(false),
        "null" => return Bson::Null,
        _ => {}
    }
    if let Ok(n) = raw.parse::<i64>() {
        return Bson::Int64(n);
    }
    if let Ok(x) = raw.parse::<f64>() {
        if x.is_finite() {
            return Bson::Double(x);
        }
    }
    Bson::String(raw.to_string())
}

/// `FIELD=VALUE` into a selector predicate.
pub fn parse_predicate(raw: &str) -> Result<(String, Bson), String> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=VALUE, got '{raw}'"))?;
    let field = field.trim();
    if field.is_empty() {
        return Err(format!("missing field name in '{raw}'"));
    }
    Ok((field.to_string(), parse_value(value)))
}

/// `FIELD[:asc|:desc|:1|:-1]` into an index key.
pub fn parse_index_key(raw: &str) -> Result<(String, Direction), String> {
    let (field, direction) = match raw.rsplit_once(':') {
        None => (raw, Direction::Ascending),
        Some((field, dir)) => {
            let direction = match dir.to_ascii_lowercase().as_str() {
                "asc" | "1" => Direction::Ascending,
                "desc" | "-1" => Direction::Descending,
                other => return Err(format!("unknown direction '{other}' (use asc or desc)")),
            };
            (field, direction)
        }
    };
    if field.is_empty() {
        return Err(format!("missing field name in '{raw}'"));
    }
    Ok((field.to_string(), direction))
}
