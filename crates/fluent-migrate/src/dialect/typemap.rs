//! Ordered-threshold type map shared by every dialect.
//!
//! Each semantic type holds an optional unsized template and a list of sized
//! templates kept in ascending capacity order. A sized request selects the
//! first template whose capacity is at least the requested size.

use std::collections::HashMap;

use crate::core::schema::DbType;
use crate::core::traits::TypeMap;
use crate::error::{MigrateError, Result};

const SIZE_PLACEHOLDER: &str = "$size";
const PRECISION_PLACEHOLDER: &str = "$precision";

#[derive(Debug, Clone, Default)]
struct Templates {
    unsized_template: Option<String>,
    /// (capacity, template), ascending by capacity.
    sized: Vec<(u32, String)>,
}

/// Type map built from registered templates.
#[derive(Debug, Clone)]
pub struct TypeMapBase {
    dialect: &'static str,
    templates: HashMap<DbType, Templates>,
}

impl TypeMapBase {
    /// Create an empty type map for `dialect`.
    pub fn new(dialect: &'static str) -> Self {
        Self {
            dialect,
            templates: HashMap::new(),
        }
    }

    /// Register the template used when no size is requested.
    pub fn set(&mut self, db_type: DbType, template: &str) -> &mut Self {
        self.templates.entry(db_type).or_default().unsized_template = Some(template.to_string());
        self
    }

    /// Register a template for sizes up to and including `capacity`.
    ///
    /// Templates stay ordered by capacity; registering the same capacity
    /// twice replaces the earlier template.
    pub fn set_sized(&mut self, db_type: DbType, template: &str, capacity: u32) -> &mut Self {
        let sized = &mut self.templates.entry(db_type).or_default().sized;
        match sized.binary_search_by_key(&capacity, |(cap, _)| *cap) {
            Ok(pos) => sized[pos].1 = template.to_string(),
            Err(pos) => sized.insert(pos, (capacity, template.to_string())),
        }
        self
    }

    /// Whether any template is registered for `db_type`.
    pub fn supports(&self, db_type: DbType) -> bool {
        self.templates.contains_key(&db_type)
    }

    fn unsupported(&self, what: String) -> MigrateError {
        MigrateError::not_supported(self.dialect, what)
    }
}

impl TypeMap for TypeMapBase {
    fn get_type_map(
        &self,
        db_type: DbType,
        size: Option<u32>,
        precision: Option<u32>,
    ) -> Result<String> {
        let templates = self
            .templates
            .get(&db_type)
            .ok_or_else(|| self.unsupported(format!("{:?} columns", db_type)))?;

        let template = match size {
            None => templates.unsized_template.as_deref().ok_or_else(|| {
                self.unsupported(format!("{:?} columns without a size", db_type))
            })?,
            Some(requested) if templates.sized.is_empty() => templates
                .unsized_template
                .as_deref()
                .ok_or_else(|| {
                    self.unsupported(format!("{:?} columns of size {}", db_type, requested))
                })?,
            Some(requested) => templates
                .sized
                .iter()
                .find(|(capacity, _)| requested <= *capacity)
                .map(|(_, template)| template.as_str())
                .ok_or_else(|| {
                    self.unsupported(format!("{:?} columns of size {}", db_type, requested))
                })?,
        };

        Ok(replace_placeholders(template, size, precision))
    }
}

fn replace_placeholders(template: &str, size: Option<u32>, precision: Option<u32>) -> String {
    template
        .replace(SIZE_PLACEHOLDER, &size.map(|s| s.to_string()).unwrap_or_default())
        .replace(PRECISION_PLACEHOLDER, &precision.unwrap_or(0).to_string())
}
