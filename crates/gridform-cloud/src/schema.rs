//! Declarative attribute schemas
//!
//! A [`Schema`] names every attribute a resource kind accepts or reports,
//! whether the operator must, may or cannot set it, and how declared values
//! are validated. The host uses it to validate manifests, fill defaults and
//! decide which keys differ from persisted state.

use crate::data::{Attributes, is_zero};
use crate::error::{CloudError, Result};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub enum ValueType {
    Int,
    String,
    Bool,
    /// Ordered sequence
    List(Box<ValueType>),
    /// Sequence compared without regard to order
    Set(Box<ValueType>),
    /// Mapping with its own schema, used as list element type
    Object(Schema),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Validator {
    IntRange(i64, i64),
    IntAtLeast(i64),
    OneOf(&'static [&'static str]),
}

impl Validator {
    fn check(&self, key: &str, value: &Value) -> std::result::Result<(), String> {
        match self {
            Validator::IntRange(min, max) => match value.as_i64() {
                Some(n) if (*min..=*max).contains(&n) => Ok(()),
                _ => Err(format!("{} must be between {} and {}, got {}", key, min, max, value)),
            },
            Validator::IntAtLeast(min) => match value.as_i64() {
                Some(n) if n >= *min => Ok(()),
                _ => Err(format!("{} must be at least {}, got {}", key, min, value)),
            },
            Validator::OneOf(allowed) => match value.as_str() {
                Some(s) if allowed.contains(&s) => Ok(()),
                _ => Err(format!("{} must be one of {:?}, got {}", key, allowed, value)),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub value_type: ValueType,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    /// Changing the value requires replacing the resource
    pub force_new: bool,
    /// Integer that only grows; a smaller declared value is satisfied
    pub grow_only: bool,
    pub sensitive: bool,
    pub default: Option<Value>,
    pub max_items: Option<usize>,
    pub validator: Option<Validator>,
    pub description: &'static str,
}

impl Attribute {
    fn new(value_type: ValueType) -> Self {
        Self {
            value_type,
            required: false,
            optional: false,
            computed: false,
            force_new: false,
            grow_only: false,
            sensitive: false,
            default: None,
            max_items: None,
            validator: None,
            description: "",
        }
    }

    pub fn required(value_type: ValueType) -> Self {
        Self {
            required: true,
            ..Self::new(value_type)
        }
    }

    pub fn optional(value_type: ValueType) -> Self {
        Self {
            optional: true,
            ..Self::new(value_type)
        }
    }

    /// Reported by the Platform, never declared
    pub fn computed(value_type: ValueType) -> Self {
        Self {
            computed: true,
            ..Self::new(value_type)
        }
    }

    /// May be declared; reported by the Platform when it is not
    pub fn optional_computed(value_type: ValueType) -> Self {
        Self {
            optional: true,
            computed: true,
            ..Self::new(value_type)
        }
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn grow_only(mut self) -> Self {
        self.grow_only = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn max_items(mut self, n: usize) -> Self {
        self.max_items = Some(n);
        self
    }

    pub fn validate_with(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    fn is_computed_only(&self) -> bool {
        self.computed && !self.optional && !self.required
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    attributes: BTreeMap<&'static str, Attribute>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attr(mut self, key: &'static str, attribute: Attribute) -> Self {
        self.attributes.insert(key, attribute);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Attribute> {
        self.attributes.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Attribute)> {
        self.attributes.iter().map(|(k, v)| (*k, v))
    }

    pub fn sensitive_keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.iter().filter(|(_, a)| a.sensitive).map(|(k, _)| k)
    }

    /// Fill unset keys that carry a default
    pub fn apply_defaults(&self, config: &mut Attributes) {
        for (key, attr) in &self.attributes {
            if let Some(default) = &attr.default
                && config.get(*key).is_none_or(Value::is_null)
            {
                config.insert(key.to_string(), default.clone());
            }
        }
    }

    /// Check a declaration: unknown keys, missing required keys, value types,
    /// list sizes and validators. All problems are reported together.
    pub fn validate(&self, config: &Attributes) -> Result<()> {
        let mut problems = Vec::new();
        self.collect_problems("", config, &mut problems);
        if problems.is_empty() {
            Ok(())
        } else {
            Err(CloudError::InvalidConfig(problems.join("; ")))
        }
    }

    fn collect_problems(&self, prefix: &str, config: &Attributes, problems: &mut Vec<String>) {
        for key in config.keys() {
            match self.attributes.get(key.as_str()) {
                None => problems.push(format!("{}{}: unknown attribute", prefix, key)),
                Some(attr) if attr.is_computed_only() && !config[key].is_null() => {
                    problems.push(format!("{}{}: attribute is computed and cannot be set", prefix, key))
                }
                _ => {}
            }
        }

        for (key, attr) in &self.attributes {
            let path = format!("{}{}", prefix, key);
            let value = match config.get(*key) {
                Some(v) if !v.is_null() => v,
                _ => {
                    if attr.required {
                        problems.push(format!("{}: required attribute is missing", path));
                    }
                    continue;
                }
            };

            if let Err(message) = check_type(&path, &attr.value_type, value, problems) {
                problems.push(message);
                continue;
            }
            if let (Some(max), Some(items)) = (attr.max_items, value.as_array())
                && items.len() > max
            {
                problems.push(format!("{}: at most {} items allowed, got {}", path, max, items.len()));
            }
            if let Some(validator) = &attr.validator
                && let Err(message) = validator.check(&path, value)
            {
                problems.push(message);
            }
        }
    }

    /// Declared keys whose value differs from the persisted one.
    ///
    /// Computed-only keys are ignored, as are optional-computed keys left
    /// unset. A grow-only key declared below the observed value counts as
    /// unchanged. Inside list elements the same rules apply per field; sets
    /// compare as multisets.
    pub fn diff_keys(&self, config: &Attributes, state: &Attributes) -> Vec<String> {
        self.attributes
            .iter()
            .filter(|(_, attr)| !attr.is_computed_only())
            .filter(|(key, attr)| {
                let declared = config.get(**key).unwrap_or(&Value::Null);
                let observed = state.get(**key).unwrap_or(&Value::Null);
                if attr.computed && is_zero(declared) {
                    return false;
                }
                if attr.grow_only
                    && let (Some(want), Some(have)) = (declared.as_u64(), observed.as_u64())
                    && want < have
                {
                    return false;
                }
                !values_match(&attr.value_type, declared, observed)
            })
            .map(|(key, _)| key.to_string())
            .collect()
    }

    /// Changed keys that cannot be updated in place
    pub fn force_new_changes(&self, config: &Attributes, state: &Attributes) -> Vec<String> {
        self.diff_keys(config, state)
            .into_iter()
            .filter(|key| {
                self.attributes.get(key.as_str()).is_some_and(|a| a.force_new)
                    && state.get(key).is_some_and(|v| !is_zero(v))
            })
            .collect()
    }
}

fn type_name(value_type: &ValueType) -> &'static str {
    match value_type {
        ValueType::Int => "an integer",
        ValueType::String => "a string",
        ValueType::Bool => "a boolean",
        ValueType::List(_) | ValueType::Set(_) => "a list",
        ValueType::Object(_) => "a mapping",
    }
}

fn check_type(
    path: &str,
    value_type: &ValueType,
    value: &Value,
    problems: &mut Vec<String>,
) -> std::result::Result<(), String> {
    let mismatch = || format!("{}: expected {}, got {}", path, type_name(value_type), value);
    match value_type {
        ValueType::Int if value.is_i64() || value.is_u64() => Ok(()),
        ValueType::String if value.is_string() => Ok(()),
        ValueType::Bool if value.is_boolean() => Ok(()),
        ValueType::List(inner) | ValueType::Set(inner) => {
            let items = value.as_array().ok_or_else(mismatch)?;
            for (i, item) in items.iter().enumerate() {
                let item_path = format!("{}[{}]", path, i);
                if let Err(message) = check_type(&item_path, inner, item, problems) {
                    problems.push(message);
                }
            }
            Ok(())
        }
        ValueType::Object(schema) => {
            let fields = value.as_object().ok_or_else(mismatch)?;
            schema.collect_problems(&format!("{}.", path), fields, problems);
            Ok(())
        }
        _ => Err(mismatch()),
    }
}

fn as_items(value: &Value) -> &[Value] {
    match value {
        Value::Array(items) => items,
        _ => &[],
    }
}

/// Whether a declared value is satisfied by an observed one
fn values_match(value_type: &ValueType, declared: &Value, observed: &Value) -> bool {
    match value_type {
        ValueType::List(inner) => {
            let (d, o) = (as_items(declared), as_items(observed));
            d.len() == o.len() && d.iter().zip(o).all(|(d, o)| values_match(inner, d, o))
        }
        ValueType::Set(inner) => {
            let (d, o) = (as_items(declared), as_items(observed));
            if d.len() != o.len() {
                return false;
            }
            let mut used = vec![false; o.len()];
            d.iter().all(|want| {
                let hit = o
                    .iter()
                    .enumerate()
                    .find(|(i, have)| !used[*i] && values_match(inner, want, have));
                match hit {
                    Some((i, _)) => {
                        used[i] = true;
                        true
                    }
                    None => false,
                }
            })
        }
        ValueType::Object(schema) => {
            let empty = Attributes::new();
            let d = declared.as_object().unwrap_or(&empty);
            let o = observed.as_object().unwrap_or(&empty);
            schema.diff_keys(d, o).is_empty()
        }
        _ => match (is_zero(declared), is_zero(observed)) {
            (true, true) => true,
            (false, false) => scalar_eq(declared, observed),
            _ => false,
        },
    }
}

fn scalar_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}
