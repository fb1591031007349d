//! Normalization of raw binding declarations into [`BindingDescriptor`]s.
//!
//! A component declares its bindings in three groups (inputs, outputs,
//! attributes). Each declaration is either a compact string or a structured
//! record:
//!
//! | String form | Meaning |
//! |-------------|---------|
//! | `""` | required, external name = property, default mode |
//! | `"<"` | required one-way |
//! | `"=?model"` | optional two-way bound to attribute `model` |
//! | `"@title"` | attribute binding read from `title` |
//! | `"&?onSave"` | optional output bound to `onSave` |
//!
//! Normalization never fails. Characters that are not a recognized marker
//! become part of the alias; a malformed declaration is the caller's problem
//! and surfaces later as a host evaluation error.
//!
//! # Example
//!
//! ```
//! use scopebind::descriptor::{BindingDeclarations, BindingMode};
//!
//! let decls = BindingDeclarations::from_field_list(&["user: <?person", "count"], &[], &["title: @"]);
//! let bindings = decls.normalize(BindingMode::TwoWay);
//!
//! assert_eq!(bindings.inputs[0].external_name, "person");
//! assert_eq!(bindings.inputs[0].mode, BindingMode::OneWay);
//! assert!(bindings.inputs[0].optional);
//! assert_eq!(bindings.inputs[1].mode, BindingMode::TwoWay);
//! assert_eq!(bindings.attrs[0].external_name, "title");
//! ```

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::{BindingError, Result};

/// How values flow for an input binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingMode {
    /// The host is the source of truth.
    #[serde(alias = "<")]
    OneWay,
    /// Host and component are kept in sync; the host wins conflicts.
    #[serde(alias = "=")]
    TwoWay,
}

/// A normalized binding declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingDescriptor {
    /// Component property receiving the value.
    pub property: String,
    /// Host attribute the value is read from.
    pub external_name: String,
    pub optional: bool,
    pub mode: BindingMode,
}

/// A binding as declared, before normalization.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RawBinding {
    /// Compact `"[marker][?][alias]"` form.
    Spec(String),
    /// Structured form.
    Structured {
        #[serde(default)]
        alias: Option<String>,
        #[serde(default)]
        optional: bool,
        #[serde(default)]
        mode: Option<BindingMode>,
    },
}

impl From<&str> for RawBinding {
    fn from(spec: &str) -> Self {
        Self::Spec(spec.to_owned())
    }
}

impl From<String> for RawBinding {
    fn from(spec: String) -> Self {
        Self::Spec(spec)
    }
}

struct ParsedSpec<'a> {
    mode: Option<BindingMode>,
    optional: bool,
    alias: &'a str,
}

fn parse_spec(spec: &str) -> ParsedSpec<'_> {
    let spec = spec.trim();
    let (mode, rest) = match spec.as_bytes().first() {
        Some(b'<') => (Some(BindingMode::OneWay), &spec[1..]),
        Some(b'=') => (Some(BindingMode::TwoWay), &spec[1..]),
        Some(b'@' | b'&') => (None, &spec[1..]),
        _ => (None, spec),
    };
    let (optional, rest) = match rest.strip_prefix('?') {
        Some(rest) => (true, rest),
        None => (false, rest),
    };
    ParsedSpec {
        mode,
        optional,
        alias: rest.trim(),
    }
}

impl RawBinding {
    /// Normalize this declaration for `property`.
    ///
    /// `default_mode` applies when the declaration carries no mode.
    #[must_use]
    pub fn describe(&self, property: &str, default_mode: BindingMode) -> BindingDescriptor {
        let (alias, optional, mode) = match self {
            Self::Spec(spec) => {
                let parsed = parse_spec(spec);
                (parsed.alias, parsed.optional, parsed.mode)
            }
            Self::Structured {
                alias,
                optional,
                mode,
            } => (alias.as_deref().unwrap_or(""), *optional, *mode),
        };
        BindingDescriptor {
            property: property.to_owned(),
            external_name: if alias.is_empty() {
                property.to_owned()
            } else {
                alias.to_owned()
            },
            optional,
            mode: mode.unwrap_or(default_mode),
        }
    }
}

/// Declared bindings of a component type, grouped by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BindingDeclarations {
    pub inputs: IndexMap<String, RawBinding>,
    pub outputs: IndexMap<String, RawBinding>,
    pub attrs: IndexMap<String, RawBinding>,
}

impl BindingDeclarations {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an input.
    #[must_use]
    pub fn input(mut self, property: impl Into<String>, raw: impl Into<RawBinding>) -> Self {
        self.inputs.insert(property.into(), raw.into());
        self
    }

    /// Declare an output.
    #[must_use]
    pub fn output(mut self, property: impl Into<String>, raw: impl Into<RawBinding>) -> Self {
        self.outputs.insert(property.into(), raw.into());
        self
    }

    /// Declare an attribute binding.
    #[must_use]
    pub fn attr(mut self, property: impl Into<String>, raw: impl Into<RawBinding>) -> Self {
        self.attrs.insert(property.into(), raw.into());
        self
    }

    /// Build declarations from `"property"` / `"property: spec"` field lists.
    #[must_use]
    pub fn from_field_list(inputs: &[&str], outputs: &[&str], attrs: &[&str]) -> Self {
        fn fields(list: &[&str]) -> IndexMap<String, RawBinding> {
            list.iter()
                .map(|field| match field.split_once(':') {
                    Some((property, spec)) => (property.trim().to_owned(), RawBinding::from(spec)),
                    None => (field.trim().to_owned(), RawBinding::from("")),
                })
                .collect()
        }
        Self {
            inputs: fields(inputs),
            outputs: fields(outputs),
            attrs: fields(attrs),
        }
    }

    /// Parse declarations from JSON.
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| BindingError::Config(e.to_string()))
    }

    /// Parse declarations from TOML.
    #[cfg(feature = "toml-config")]
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| BindingError::Config(e.to_string()))
    }

    /// Total number of declared bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inputs.len() + self.outputs.len() + self.attrs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Normalize every declaration, preserving declaration order.
    ///
    /// Outputs and attributes are always one-way; inputs without a mode
    /// marker get `default_input_mode`.
    #[must_use]
    pub fn normalize(&self, default_input_mode: BindingMode) -> NormalizedBindings {
        let group = |decls: &IndexMap<String, RawBinding>, forced: Option<BindingMode>| {
            decls
                .iter()
                .map(|(property, raw)| {
                    let mut descriptor = raw.describe(property, default_input_mode);
                    if let Some(mode) = forced {
                        descriptor.mode = mode;
                    }
                    descriptor
                })
                .collect::<Vec<_>>()
        };
        NormalizedBindings {
            inputs: group(&self.inputs, None),
            outputs: group(&self.outputs, Some(BindingMode::OneWay)),
            attrs: group(&self.attrs, Some(BindingMode::OneWay)),
        }
    }
}

/// Normalized descriptors of one installation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedBindings {
    pub inputs: Vec<BindingDescriptor>,
    pub outputs: Vec<BindingDescriptor>,
    pub attrs: Vec<BindingDescriptor>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn describe(spec: &str) -> BindingDescriptor {
        RawBinding::from(spec).describe("value", BindingMode::TwoWay)
    }

    #[test]
    fn empty_spec_defaults() {
        let d = describe("");
        assert_eq!(d.external_name, "value");
        assert!(!d.optional);
        assert_eq!(d.mode, BindingMode::TwoWay);
    }

    #[test]
    fn markers_and_optional() {
        let d = describe("<?model");
        assert_eq!(d.external_name, "model");
        assert!(d.optional);
        assert_eq!(d.mode, BindingMode::OneWay);

        let d = describe("=");
        assert_eq!(d.external_name, "value");
        assert_eq!(d.mode, BindingMode::TwoWay);

        let d = describe("?");
        assert!(d.optional);
        assert_eq!(d.external_name, "value");
    }

    #[test]
    fn unknown_characters_become_alias() {
        let d = describe("!weird");
        assert_eq!(d.external_name, "!weird");
        assert!(!d.optional);
    }

    #[test]
    fn structured_form() {
        let raw = RawBinding::Structured {
            alias: Some("other".into()),
            optional: true,
            mode: Some(BindingMode::OneWay),
        };
        let d = raw.describe("value", BindingMode::TwoWay);
        assert_eq!(d.external_name, "other");
        assert!(d.optional);
        assert_eq!(d.mode, BindingMode::OneWay);

        let bare = RawBinding::Structured {
            alias: None,
            optional: false,
            mode: None,
        };
        assert_eq!(bare.describe("value", BindingMode::OneWay).external_name, "value");
    }

    #[test]
    fn outputs_and_attrs_forced_one_way() {
        let decls = BindingDeclarations::new()
            .input("a", "")
            .output("changed", "&?onChange")
            .attr("title", "=");
        let n = decls.normalize(BindingMode::TwoWay);
        assert_eq!(n.inputs[0].mode, BindingMode::TwoWay);
        assert_eq!(n.outputs[0].mode, BindingMode::OneWay);
        assert_eq!(n.outputs[0].external_name, "onChange");
        assert!(n.outputs[0].optional);
        assert_eq!(n.attrs[0].mode, BindingMode::OneWay);
    }

    #[test]
    fn field_list_preserves_order() {
        let decls = BindingDeclarations::from_field_list(&["b", "a: <x", "c:=?"], &[], &[]);
        let names: Vec<_> = decls
            .normalize(BindingMode::OneWay)
            .inputs
            .into_iter()
            .map(|d| (d.property, d.external_name))
            .collect();
        assert_eq!(
            names,
            vec![
                ("b".to_string(), "b".to_string()),
                ("a".to_string(), "x".to_string()),
                ("c".to_string(), "c".to_string()),
            ]
        );
        assert_eq!(decls.len(), 3);
    }

    #[test]
    fn json_declarations_accept_both_forms() {
        let decls = BindingDeclarations::from_json_str(
            r#"{
                "inputs": {
                    "user": "<?person",
                    "model": { "alias": "ngModel", "mode": "=" }
                },
                "attrs": { "title": { "optional": true } }
            }"#,
        )
        .unwrap();
        let n = decls.normalize(BindingMode::OneWay);
        assert_eq!(n.inputs[0].external_name, "person");
        assert_eq!(n.inputs[1].external_name, "ngModel");
        assert_eq!(n.inputs[1].mode, BindingMode::TwoWay);
        assert!(n.attrs[0].optional);
        assert!(n.outputs.is_empty());
    }

    #[test]
    fn json_rejects_unknown_group() {
        let err = BindingDeclarations::from_json_str(r#"{ "events": {} }"#).unwrap_err();
        assert!(matches!(err, BindingError::Config(_)));
    }
}
