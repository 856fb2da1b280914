//! Capabilities of the target dialect

use crate::error::{Result, TranslateError};
use hql_ir::Expr;
use std::borrow::Cow;

/// Static facts about a SQL dialect, consulted by the formatter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    pub name: &'static str,
    /// Wrap identifiers in backticks
    pub quotes_identifiers: bool,
    pub allows_multiple_commands: bool,
    pub allows_subquery_in_select_without_from: bool,
    pub allows_distinct_in_aggregates: bool,
    pub supports_generated_id: bool,
}

impl Dialect {
    pub const HIVE: Dialect = Dialect {
        name: "hive",
        quotes_identifiers: false,
        allows_multiple_commands: false,
        allows_subquery_in_select_without_from: true,
        allows_distinct_in_aggregates: true,
        supports_generated_id: false,
    };

    pub fn quote<'a>(&self, name: &'a str) -> Cow<'a, str> {
        if self.quotes_identifiers {
            Cow::Owned(format!("`{}`", name.replace('`', "``")))
        } else {
            Cow::Borrowed(name)
        }
    }

    /// Expression reading back the store-generated identity of `member`
    pub fn generated_id_expression(&self, member: &str) -> Result<Expr> {
        if !self.supports_generated_id {
            return Err(TranslateError::unsupported(format!(
                "{} has no generated identity for member '{}'",
                self.name, member
            )));
        }
        Ok(Expr::GeneratedId {
            member: member.to_string(),
        })
    }
}

impl Default for Dialect {
    fn default() -> Self {
        Dialect::HIVE
    }
}
