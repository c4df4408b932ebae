//! Field resolution: merge a template's field set with runtime user data.

use crate::field::TemplateField;
use std::collections::{BTreeMap, HashMap};

/// Lookup of user-supplied values by field id.
pub trait FieldValues {
    fn get_value(&self, id: &str) -> Option<&str>;
}

impl FieldValues for HashMap<String, String> {
    fn get_value(&self, id: &str) -> Option<&str> {
        self.get(id).map(String::as_str)
    }
}

impl FieldValues for BTreeMap<String, String> {
    fn get_value(&self, id: &str) -> Option<&str> {
        self.get(id).map(String::as_str)
    }
}

impl FieldValues for [(&str, &str)] {
    fn get_value(&self, id: &str) -> Option<&str> {
        self.iter().find(|(k, _)| *k == id).map(|(_, v)| *v)
    }
}

impl<const N: usize> FieldValues for [(&str, &str); N] {
    fn get_value(&self, id: &str) -> Option<&str> {
        self.as_slice().get_value(id)
    }
}

/// Produce a new field list with user values applied.
///
/// A field takes the user's value only when it is editable and the value is
/// a non-empty string; otherwise the template default is kept. The output
/// has the same length and order as `template`, which is never mutated.
pub fn resolve<D>(template: &[TemplateField], data: &D) -> Vec<TemplateField>
where
    D: FieldValues + ?Sized,
{
    template
        .iter()
        .map(|field| {
            let mut out = field.clone();
            if field.editable {
                if let Some(v) = data.get_value(&field.id).filter(|v| !v.is_empty()) {
                    out.value = v.to_string();
                }
            }
            out
        })
        .collect()
}

/// The `id -> value` view of a resolved field list.
pub fn resolved_values(fields: &[TemplateField]) -> BTreeMap<String, String> {
    fields
        .iter()
        .map(|f| (f.id.clone(), f.value.clone()))
        .collect()
}
