//! Translation entry point

use crate::config::TranslatorConfig;
use crate::dialect::Dialect;
use crate::error::{Result, TranslateError};
use crate::{format, order_by, paging, prune, resources, resync, validate};
use hql_ir::{MappingProvider, Statement};
use serde::Serialize;
use tracing::{debug, info_span};

/// HiveQL text plus the resource files it needs staged
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledQuery {
    pub hiveql: String,
    pub resources: Vec<String>,
}

impl CompiledQuery {
    /// `ADD FILE` directives to issue before the query, in staging order
    pub fn add_file_directives(&self) -> Vec<String> {
        self.resources.iter().map(|path| format!("ADD FILE {path}")).collect()
    }
}

/// The Hive pass pipeline
///
/// Holds no state between calls; one value can translate any number of
/// statements, from any number of threads.
pub struct HiveLinguist<'a> {
    dialect: Dialect,
    mapping: &'a dyn MappingProvider,
    config: TranslatorConfig,
}

impl<'a> HiveLinguist<'a> {
    pub fn new(mapping: &'a dyn MappingProvider) -> Self {
        Self {
            dialect: Dialect::HIVE,
            mapping,
            config: TranslatorConfig::default(),
        }
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_config(mut self, config: TranslatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    /// Run every rewrite and validate the result
    ///
    /// Either the returned tree satisfies all reference and naming invariants or
    /// the call fails; there is no partial output.
    pub fn translate(&self, statement: &Statement) -> Result<Statement> {
        let span = info_span!("translate", fingerprint = %statement.fingerprint());
        let _enter = span.enter();

        self.config
            .validate()
            .map_err(|e| TranslateError::unsupported(e.to_string()))?;

        let statement = order_by::normalize_order_by(statement)?;
        let statement = paging::rewrite_paging(&statement, &self.config.row_number_column)?;
        let statement = order_by::normalize_order_by(&statement)?;
        let statement = resync::resynchronize(&statement, self.mapping, self.config.allow_positional_fallback)?;
        let statement = prune::remove_redundant_columns(&statement)?;
        let statement = prune::remove_unused_columns(&statement)?;
        validate::validate(&statement)?;

        debug!(output = %statement.fingerprint(), "translation complete");
        Ok(statement)
    }

    /// Parameter binding is not supported by this dialect; the tree is returned as is
    pub fn parameterize(&self, statement: Statement) -> Statement {
        statement
    }

    pub fn format(&self, statement: &Statement) -> Result<String> {
        format::format(statement, &self.dialect)
    }

    pub fn extract_file_references(&self, statement: &Statement) -> Vec<String> {
        resources::extract_file_references(statement)
    }

    /// Translate, then render text and collect resources from the same tree
    pub fn compile(&self, statement: &Statement) -> Result<CompiledQuery> {
        let translated = self.parameterize(self.translate(statement)?);
        Ok(CompiledQuery {
            hiveql: self.format(&translated)?,
            resources: self.extract_file_references(&translated),
        })
    }
}
