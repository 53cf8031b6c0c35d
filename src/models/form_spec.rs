//! Form field maps for the asset create and macro edit forms
//!
//! Loaded from TOML when `form_spec_path` is set:
//!
//! ```toml
//! [edit.field_map]
//! value_base = "#value_base_id"
//! [edit.field_types]
//! value_base = "select"
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Text,
    Date,
    Select,
    Checkbox,
}

/// Field name -> CSS selector, plus how each field is filled
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormSpec {
    #[serde(default)]
    pub field_map: BTreeMap<String, String>,
    #[serde(default)]
    pub field_types: BTreeMap<String, FieldType>,
}

impl FormSpec {
    pub fn field_type(&self, key: &str) -> FieldType {
        self.field_types.get(key).copied().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormSpecs {
    #[serde(default = "default_create_form")]
    pub create: FormSpec,
    #[serde(default = "default_edit_form")]
    pub edit: FormSpec,
}

impl Default for FormSpecs {
    fn default() -> Self {
        Self {
            create: default_create_form(),
            edit: default_edit_form(),
        }
    }
}

const ASSET_FIELDS: &[(&str, FieldType)] = &[
    ("asset_type", FieldType::Select),
    ("asset_name", FieldType::Text),
    ("asset_usage_id", FieldType::Select),
    ("value_base", FieldType::Select),
    ("inspection_date", FieldType::Date),
    ("final_value", FieldType::Text),
    ("production_capacity", FieldType::Text),
    ("production_capacity_measuring_unit", FieldType::Text),
    ("product_type", FieldType::Text),
    ("market_approach", FieldType::Select),
    ("market_approach_value", FieldType::Text),
    ("cost_approach", FieldType::Select),
    ("cost_approach_value", FieldType::Text),
    ("country", FieldType::Select),
    ("region", FieldType::Select),
    ("city", FieldType::Select),
];

fn asset_form() -> FormSpec {
    let mut spec = FormSpec::default();
    for (key, ty) in ASSET_FIELDS {
        spec.field_map
            .insert(key.to_string(), format!("[name=\"{}\"]", key));
        spec.field_types.insert(key.to_string(), *ty);
    }
    spec
}

fn default_create_form() -> FormSpec {
    let mut spec = asset_form();
    spec.field_map
        .insert("number_of_macros".into(), crate::site::ASSET_FORM_ANCHOR.into());
    spec
}

fn default_edit_form() -> FormSpec {
    let mut spec = asset_form();
    spec.field_map
        .insert("value_base".into(), crate::site::MACRO_EDIT_ANCHOR.into());
    spec
}

/// Load form specs from a TOML file
pub async fn load_form_specs(path: &Path) -> Result<FormSpecs> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("cannot read form spec: {}", path.display()))?;
    let specs = toml::from_str(&content)
        .with_context(|| format!("cannot parse form spec: {}", path.display()))?;
    tracing::info!("loaded form spec from {}", path.display());
    Ok(specs)
}
