//! Expansion of flat `name[sub]` field names into a nested body
//!
//! Browsers submit repeated groups as `version_control_1[version_control_domain]`
//! and map rows as `version_control_1[version_control_source]_2[key]`. Only
//! the bracketed segments nest; text between them is ignored, so map rows
//! collapse into parallel `key`/`value` lists. A name given more than once
//! becomes a list.

use crate::error::AgentConfigError;
use anyhow::Result;
use regex::Regex;
use serde_json::{Map, Value};

/// Expand flat fields into `body`
///
/// # Errors
///
/// Returns an error if a name has no leading plain part, or if a name is
/// used both as a value and as a nested group.
pub fn expand_into<'a, I>(body: &mut Map<String, Value>, fields: I) -> Result<()>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let segment = Regex::new(r"\[([^\[\]]*)\]")?;

    for (name, value) in fields {
        let root = name.split('[').next().unwrap_or_default();
        if root.is_empty() {
            return Err(AgentConfigError::validation(format!("Invalid field name '{name}'")).into());
        }
        let path: Vec<&str> = segment
            .captures_iter(&name[root.len()..])
            .filter_map(|captures| captures.get(1))
            .map(|m| m.as_str())
            .filter(|s| !s.is_empty())
            .collect();
        insert(body, root, &path, value).map_err(|()| {
            AgentConfigError::validation(format!("Field '{name}' conflicts with another field"))
        })?;
    }
    Ok(())
}

/// Expand flat fields into a new body
///
/// # Errors
///
/// See [`expand_into`].
pub fn expand_fields<'a, I>(fields: I) -> Result<Map<String, Value>>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut body = Map::new();
    expand_into(&mut body, fields)?;
    Ok(body)
}

/// Lay `fields` over `body`: nested groups merge, every other value replaces
/// the one in `body`
pub fn overlay(body: &mut Map<String, Value>, fields: Map<String, Value>) {
    for (name, value) in fields {
        match value {
            Value::Object(nested) if body.get(&name).is_some_and(Value::is_object) => {
                if let Some(Value::Object(existing)) = body.get_mut(&name) {
                    overlay(existing, nested);
                }
            }
            value => {
                body.insert(name, value);
            }
        }
    }
}

fn insert(map: &mut Map<String, Value>, name: &str, path: &[&str], value: &str) -> Result<(), ()> {
    let Some((next, rest)) = path.split_first() else {
        let value = Value::String(value.to_owned());
        match map.get_mut(name) {
            None => {
                map.insert(name.to_owned(), value);
            }
            Some(Value::Array(values)) => values.push(value),
            Some(Value::Object(_)) => return Err(()),
            Some(existing) => *existing = Value::Array(vec![existing.take(), value]),
        }
        return Ok(());
    };

    let child = map
        .entry(name.to_owned())
        .or_insert_with(|| Value::Object(Map::new()));
    match child {
        Value::Object(child) => insert(child, next, rest, value),
        _ => Err(()),
    }
}
