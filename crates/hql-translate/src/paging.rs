//! Skip/take emulation with ROW_NUMBER()
//!
//! Hive has no OFFSET. A paged select is rewritten into
//!
//! ```text
//! SELECT cols FROM (
//!     SELECT cols, ROW_NUMBER() OVER (ORDER BY ...) AS rn FROM ...
//! ) inner
//! WHERE rn > skip AND rn <= skip + take
//! ORDER BY rn
//! ```
//!
//! The outer select keeps the original alias and column names, so enclosing
//! selects and the projector keep resolving. DISTINCT and grouped selects get an
//! extra level first so the row number does not take part in them.

use crate::error::{Result, TranslateError};
use crate::naming::{available_column_name, numbered_column_name, AliasGenerator};
use hql_ir::visit::{self, Rewriter};
use hql_ir::{BinOp, ColumnDeclaration, DataType, Expr, OrderTerm, Select, Source, Statement};
use std::sync::Arc;
use tracing::{debug, warn};

/// Replace skip/take on every select of the statement
pub fn rewrite_paging(statement: &Statement, row_number_column: &str) -> Result<Statement> {
    let mut rewriter = PagingRewriter {
        aliases: AliasGenerator::for_statement(statement),
        row_number_column,
    };
    statement.try_map_queries(&mut |projection| visit::rewrite_projection(&mut rewriter, projection))
}

struct PagingRewriter<'a> {
    aliases: AliasGenerator,
    row_number_column: &'a str,
}

impl Rewriter for PagingRewriter<'_> {
    type Error = TranslateError;

    fn rewrite_select(&mut self, select: &Arc<Select>) -> Result<Arc<Select>> {
        let select = visit::rewrite_select_children(self, select)?;
        if !select.has_paging() {
            return Ok(select);
        }
        self.page(&select)
    }
}

impl PagingRewriter<'_> {
    fn page(&mut self, select: &Select) -> Result<Arc<Select>> {
        let skip = select.skip.filter(|&skip| skip > 0);
        let take = select.take;

        if skip.is_none() && take.is_none() {
            // skip 0: nothing to emulate
            let mut select = select.clone();
            select.skip = None;
            return Ok(Arc::new(select));
        }

        let ordering = if select.order_by.is_empty() {
            warn!(alias = %select.alias, "paging without ordering, numbering rows by declared column order");
            default_ordering(select)?
        } else {
            select.order_by.clone()
        };

        let mut numbered = select.clone();
        numbered.alias = self.aliases.fresh();
        numbered.skip = None;
        numbered.take = None;
        numbered.order_by = Vec::new();
        numbered.reverse = false;

        let (mut numbered, ordering) = if select.distinct || !select.group_by.is_empty() {
            self.wrap(numbered, ordering)?
        } else {
            (numbered, ordering)
        };

        let row_number = available_column_name(&numbered.columns, self.row_number_column);
        numbered.columns.push(ColumnDeclaration::new(
            row_number.clone(),
            Expr::RowNumber { order_by: ordering },
            DataType::Int,
        ));

        let row_number_ref = numbered.column_ref(&row_number);
        let filter = paging_predicate(&row_number_ref, skip, take)?;
        let columns = select
            .columns
            .iter()
            .map(|c| ColumnDeclaration::new(c.name.clone(), numbered.column_ref(&c.name), c.data_type.clone()))
            .collect();

        debug!(
            alias = %select.alias,
            inner = %numbered.alias,
            skip = ?skip,
            take = ?take,
            "rewrote skip/take to row number filter"
        );

        let outer = Select::new(select.alias.clone(), columns, Some(Source::subquery(numbered)))
            .with_filter(filter)
            .with_order_by(vec![OrderTerm::asc(row_number_ref)]);
        Ok(Arc::new(outer))
    }

    /// Put `base` under a plain select exposing the same columns; `ordering` is
    /// re-expressed through `base`'s columns
    fn wrap(&mut self, mut base: Select, ordering: Vec<OrderTerm>) -> Result<(Select, Vec<OrderTerm>)> {
        let mut mapped = Vec::with_capacity(ordering.len());
        for term in ordering {
            let name = match base.column_for_expr(&term.expr) {
                Some(column) => column.name.clone(),
                None if !base.distinct => {
                    let name = numbered_column_name(&base.columns, "c");
                    base.columns
                        .push(ColumnDeclaration::new(name.clone(), term.expr.clone(), DataType::Unknown));
                    name
                }
                None => {
                    return Err(TranslateError::unsupported(format!(
                        "DISTINCT select '{}' cannot be paged by an expression it does not project",
                        base.alias
                    )))
                }
            };
            mapped.push(OrderTerm {
                expr: base.column_ref(&name),
                direction: term.direction,
            });
        }

        let columns = base
            .columns
            .iter()
            .map(|c| ColumnDeclaration::new(c.name.clone(), base.column_ref(&c.name), c.data_type.clone()))
            .collect();
        let wrapper = Select::new(self.aliases.fresh(), columns, Some(Source::subquery(base)));
        Ok((wrapper, mapped))
    }
}

/// Declared column order, skipping columns that are whole subqueries
fn default_ordering(select: &Select) -> Result<Vec<OrderTerm>> {
    let ordering: Vec<_> = select
        .columns
        .iter()
        .filter(|c| {
            !matches!(
                c.expr,
                Expr::ScalarSubquery { .. } | Expr::Exists { .. } | Expr::InSubquery { .. }
            )
        })
        .map(|c| OrderTerm::asc(c.expr.clone()))
        .collect();

    if ordering.is_empty() {
        return Err(TranslateError::inconsistent(format!(
            "select '{}' has no column to derive a paging order from",
            select.alias
        )));
    }
    Ok(ordering)
}

fn bound(value: u64) -> Result<Expr> {
    i64::try_from(value)
        .map(Expr::int)
        .map_err(|_| TranslateError::unsupported(format!("paging bound {value} exceeds BIGINT")))
}

/// `rn > skip AND rn <= skip + take`, reduced when either side is absent
pub(crate) fn paging_predicate(row_number: &Expr, skip: Option<u64>, take: Option<u64>) -> Result<Expr> {
    let after = |skip: u64| Ok::<_, TranslateError>(Expr::binary(BinOp::Gt, row_number.clone(), bound(skip)?));
    let up_to = |last: u64| Ok::<_, TranslateError>(Expr::binary(BinOp::Le, row_number.clone(), bound(last)?));

    match (skip, take) {
        (Some(skip), Some(take)) => {
            let last = skip
                .checked_add(take)
                .ok_or_else(|| TranslateError::unsupported(format!("skip {skip} + take {take} overflows")))?;
            Ok(Expr::and(after(skip)?, up_to(last)?))
        }
        (Some(skip), None) => after(skip),
        (None, Some(take)) => up_to(take),
        (None, None) => Err(TranslateError::inconsistent("paging predicate requested without skip or take")),
    }
}
