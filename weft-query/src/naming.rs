//! Default naming conventions for tables, roles and foreign keys.

use convert_case::{Case, Casing};

/// English pluralisation good enough for model names.
pub fn pluralize(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }
    let lower = word.to_lowercase();
    if let Some(stem) = word.strip_suffix('y') {
        let before = lower.chars().rev().nth(1);
        if !matches!(before, Some('a' | 'e' | 'i' | 'o' | 'u')) {
            return format!("{}ies", stem);
        }
    }
    if ["s", "x", "z", "ch", "sh"].iter().any(|s| lower.ends_with(s)) {
        return format!("{}es", word);
    }
    format!("{}s", word)
}

/// Inverse of [`pluralize`] for the suffixes it produces.
pub fn singularize(word: &str) -> String {
    if let Some(stem) = word.strip_suffix("ies") {
        return format!("{}y", stem);
    }
    for suffix in ["ses", "xes", "zes", "ches", "shes"] {
        if word.ends_with(suffix) {
            return word[..word.len() - 2].to_string();
        }
    }
    match word.strip_suffix('s') {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => word.to_string(),
    }
}

/// Default role name for a single-valued association (`User` → `user`).
pub fn single_role(target: &str) -> String {
    target.to_case(Case::Camel)
}

/// Default role name for a multi-valued association (`Task` → `tasks`).
pub fn many_role(target: &str) -> String {
    pluralize(&target.to_case(Case::Camel))
}

/// Default foreign key column referencing `entity` (`User` → `UserId`).
pub fn foreign_key(entity: &str) -> String {
    format!("{}Id", entity.to_case(Case::Pascal))
}
