//! Typed accessors over a source's `options` table

use super::StrategyError;
use std::collections::BTreeMap;

/// Database name -> table or collection names; an empty list means "all"
pub type Selection = BTreeMap<String, Vec<String>>;

/// First value present under any of `keys`
pub(crate) fn lookup<'a>(options: &'a toml::Table, keys: &[&str]) -> Option<&'a toml::Value> {
    keys.iter().find_map(|key| options.get(*key))
}

pub(crate) fn get_str<'a>(
    driver: &'static str,
    options: &'a toml::Table,
    key: &str,
) -> Result<Option<&'a str>, StrategyError> {
    match options.get(key) {
        None => Ok(None),
        Some(toml::Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(StrategyError::validation(
            driver,
            format!("'{}' should be a string, {} given", key, other.type_str()),
        )),
    }
}

pub(crate) fn get_bool(
    driver: &'static str,
    options: &toml::Table,
    keys: &[&str],
) -> Result<Option<bool>, StrategyError> {
    match lookup(options, keys) {
        None => Ok(None),
        Some(toml::Value::Boolean(b)) => Ok(Some(*b)),
        Some(other) => Err(StrategyError::validation(
            driver,
            format!("'{}' should be a boolean, {} given", keys[0], other.type_str()),
        )),
    }
}

/// Integer option, also accepting numeric strings
pub(crate) fn get_int(
    driver: &'static str,
    options: &toml::Table,
    key: &str,
) -> Result<Option<i64>, StrategyError> {
    match options.get(key) {
        None => Ok(None),
        Some(toml::Value::Integer(i)) => Ok(Some(*i)),
        Some(toml::Value::String(s)) => s.trim().parse::<i64>().map(Some).map_err(|_| {
            StrategyError::validation(driver, format!("'{}' should be numeric, got '{}'", key, s))
        }),
        Some(other) => Err(StrategyError::validation(
            driver,
            format!("'{}' should be numeric, {} given", key, other.type_str()),
        )),
    }
}

/// A list of strings; a single string counts as a one-element list
pub(crate) fn get_string_list(
    driver: &'static str,
    options: &toml::Table,
    keys: &[&str],
) -> Result<Vec<String>, StrategyError> {
    match lookup(options, keys) {
        None => Ok(Vec::new()),
        Some(toml::Value::String(s)) => Ok(vec![s.clone()]),
        Some(toml::Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                toml::Value::String(s) => Ok(s.clone()),
                other => Err(StrategyError::validation(
                    driver,
                    format!("items of '{}' should be strings, {} given", keys[0], other.type_str()),
                )),
            })
            .collect(),
        Some(other) => Err(StrategyError::validation(
            driver,
            format!("'{}' should be a list of strings, {} given", keys[0], other.type_str()),
        )),
    }
}

/// Parse a database selection
///
/// Accepts a list of names (`["db1", "db2"]`), a table of name -> list
/// (`{ db2 = ["t1"] }`), or a list mixing both (`["db1", { db2 = ["t1"] }]`).
pub(crate) fn get_selection(
    driver: &'static str,
    options: &toml::Table,
    key: &str,
) -> Result<Selection, StrategyError> {
    let mut selection = Selection::new();

    match options.get(key) {
        None => {}
        Some(toml::Value::Array(items)) => {
            for item in items {
                match item {
                    toml::Value::String(name) => {
                        selection.entry(name.clone()).or_default();
                    }
                    toml::Value::Table(table) => merge_table(driver, key, table, &mut selection)?,
                    other => {
                        return Err(StrategyError::validation(
                            driver,
                            format!(
                                "items of '{}' should be names or tables, {} given",
                                key,
                                other.type_str()
                            ),
                        ))
                    }
                }
            }
        }
        Some(toml::Value::Table(table)) => merge_table(driver, key, table, &mut selection)?,
        Some(other) => {
            return Err(StrategyError::validation(
                driver,
                format!("'{}' should be a list or a table, {} given", key, other.type_str()),
            ))
        }
    }

    Ok(selection)
}

fn merge_table(
    driver: &'static str,
    key: &str,
    table: &toml::Table,
    selection: &mut Selection,
) -> Result<(), StrategyError> {
    for (database, value) in table {
        let names = match value {
            toml::Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        StrategyError::validation(
                            driver,
                            format!("'{}.{}' should only contain strings", key, database),
                        )
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            toml::Value::String(name) => vec![name.clone()],
            other => {
                return Err(StrategyError::validation(
                    driver,
                    format!("'{}.{}' should be a list, {} given", key, database, other.type_str()),
                ))
            }
        };
        selection.entry(database.clone()).or_default().extend(names);
    }
    Ok(())
}
