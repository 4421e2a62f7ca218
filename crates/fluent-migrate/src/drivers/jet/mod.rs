//! Microsoft Jet (Access) generator.
//!
//! There is no Jet processor; scripts are produced through the
//! connectionless processor.

use chrono::NaiveDateTime;

use crate::core::expression::*;
use crate::core::schema::{ColumnDefinition, DbType, SystemMethod};
use crate::core::traits::{CompatibilityMode, Generator, Quoter, TypeMap};
use crate::dialect::generator as base;
use crate::dialect::TypeMapBase;
use crate::error::{MigrateError, Result};

/// Canonical Jet database type identifier.
pub const JET: &str = "Jet";

/// Other identifiers accepted for this dialect.
pub const JET_ALIASES: &[&str] = &["access"];

const MEMO_CAPACITY: u32 = 1_073_741_823;

#[derive(Debug, Clone, Default)]
pub struct JetQuoter;

impl Quoter for JetQuoter {
    fn open_quote(&self) -> &str {
        "["
    }

    fn close_quote(&self) -> &str {
        "]"
    }

    /// Jet date literals are delimited with `#`.
    fn format_date_time(&self, value: NaiveDateTime) -> String {
        format!("#{}#", value.format("%Y-%m-%d %H:%M:%S"))
    }

    fn format_system_method(&self, method: SystemMethod) -> Result<String> {
        match method {
            SystemMethod::CurrentDateTime => Ok("Now()".to_string()),
            other => Err(MigrateError::not_supported(JET, format!("{:?} defaults", other))),
        }
    }
}

/// Jet type map. Int64 has no native type and maps to `DECIMAL(20,0)`.
pub fn jet_type_map() -> TypeMapBase {
    let mut map = TypeMapBase::new(JET);
    map.set(DbType::AnsiStringFixedLength, "CHAR(255)")
        .set_sized(DbType::AnsiStringFixedLength, "CHAR($size)", 255)
        .set(DbType::AnsiString, "VARCHAR(255)")
        .set_sized(DbType::AnsiString, "VARCHAR($size)", 255)
        .set_sized(DbType::AnsiString, "TEXT", MEMO_CAPACITY)
        .set(DbType::Binary, "VARBINARY(8000)")
        .set_sized(DbType::Binary, "VARBINARY($size)", 8000)
        .set_sized(DbType::Binary, "IMAGE", i32::MAX as u32)
        .set(DbType::Boolean, "BIT")
        .set(DbType::Byte, "BYTE")
        .set(DbType::Currency, "MONEY")
        .set(DbType::Date, "DATETIME")
        .set(DbType::DateTime, "DATETIME")
        .set(DbType::DateTime2, "DATETIME")
        .set(DbType::Decimal, "DECIMAL(19,5)")
        .set_sized(DbType::Decimal, "DECIMAL($size,$precision)", 28)
        .set(DbType::Double, "FLOAT")
        .set(DbType::Guid, "UNIQUEIDENTIFIER")
        .set(DbType::Int16, "SMALLINT")
        .set(DbType::Int32, "INTEGER")
        .set(DbType::Int64, "DECIMAL(20,0)")
        .set(DbType::Single, "REAL")
        .set(DbType::StringFixedLength, "CHAR(255)")
        .set_sized(DbType::StringFixedLength, "CHAR($size)", 255)
        .set(DbType::String, "VARCHAR(255)")
        .set_sized(DbType::String, "VARCHAR($size)", 255)
        .set_sized(DbType::String, "TEXT", MEMO_CAPACITY)
        .set(DbType::Time, "DATETIME");
    map
}

#[derive(Debug, Clone)]
pub struct JetGenerator {
    quoter: JetQuoter,
    types: TypeMapBase,
    mode: CompatibilityMode,
}

impl JetGenerator {
    pub fn new(mode: CompatibilityMode) -> Self {
        Self {
            quoter: JetQuoter,
            types: jet_type_map(),
            mode,
        }
    }
}

impl Default for JetGenerator {
    fn default() -> Self {
        Self::new(CompatibilityMode::Strict)
    }
}

impl Generator for JetGenerator {
    fn dialect(&self) -> &str {
        JET
    }

    fn aliases(&self) -> &[&str] {
        JET_ALIASES
    }

    fn quoter(&self) -> &dyn Quoter {
        &self.quoter
    }

    fn type_map(&self) -> &dyn TypeMap {
        &self.types
    }

    fn compatibility_mode(&self) -> CompatibilityMode {
        self.mode
    }

    fn format_identity(&self, column: &ColumnDefinition) -> Result<String> {
        base::require_integer_identity(JET, column)?;
        if column.db_type == Some(DbType::Int64) {
            return Err(MigrateError::not_supported(JET, "Int64 identity columns"));
        }
        Ok("IDENTITY(1,1)".to_string())
    }

    /// Outside strict mode the column keeps its declared type and loses the expression.
    fn format_computed_column(&self, column: &ColumnDefinition) -> Result<String> {
        let note = self.compatibility_note("computed columns", "created as a plain column")?;
        let plain = ColumnDefinition {
            computed: None,
            ..column.clone()
        };
        let mut sql = self.format_column(&plain, false)?;
        if let Some(note) = note {
            sql.push_str(&base::inline_comment(&note));
        }
        Ok(sql)
    }

    fn delete_table(&self, e: &DeleteTableExpression) -> Result<Vec<String>> {
        if e.if_exists {
            return self.compatibility("DROP TABLE IF EXISTS");
        }
        base::delete_table(self, e)
    }

    fn rename_table(&self, _e: &RenameTableExpression) -> Result<Vec<String>> {
        self.compatibility("renaming tables")
    }

    fn rename_column(&self, _e: &RenameColumnExpression) -> Result<Vec<String>> {
        self.compatibility("renaming columns")
    }

    fn delete_index(&self, e: &DeleteIndexExpression) -> Result<Vec<String>> {
        Ok(vec![format!(
            "DROP INDEX {} ON {}",
            self.quoter.quote_identifier(base::index_name(&e.index)?),
            self.quoter.quote_identifier(&e.index.table_name)
        )])
    }

    fn create_sequence(&self, _e: &CreateSequenceExpression) -> Result<Vec<String>> {
        self.compatibility("sequences")
    }

    fn delete_sequence(&self, _e: &DeleteSequenceExpression) -> Result<Vec<String>> {
        self.compatibility("sequences")
    }

    fn create_schema(&self, _e: &CreateSchemaExpression) -> Result<Vec<String>> {
        self.compatibility("schemas")
    }

    fn delete_schema(&self, _e: &DeleteSchemaExpression) -> Result<Vec<String>> {
        self.compatibility("schemas")
    }
}
