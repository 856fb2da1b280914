//! Column pruning
//!
//! Paging and order lifting leave subqueries exposing more than their readers
//! need. Two cleanups run after resynchronization:
//!
//! - redundant columns: a column whose expression equals an earlier column of
//!   the same select is dropped and its references are pointed at the survivor;
//! - unused columns: a subquery column nothing references is dropped, repeated
//!   until nothing changes.
//!
//! Both cleanups skip the top select, duplicates included: resynchronization
//! has already laid it out one column per mapped member, and the reader depends
//! on that shape. DISTINCT selects and expression subqueries keep all their
//! columns, and no select loses its last column.

use crate::error::{Result, TranslateError};
use hql_ir::visit::{self, Rewriter, Visitor};
use hql_ir::{ColumnDeclaration, Expr, Projection, Select, Statement};
use std::collections::{HashMap, HashSet};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::debug;

/// Drop duplicate subquery columns, redirecting references to the first one
///
/// The top select keeps duplicate columns; each one backs a mapped member.
pub fn remove_redundant_columns(statement: &Statement) -> Result<Statement> {
    statement.try_map_queries(&mut |projection| {
        let mut rewriter = RedundantColumns::default();
        Ok(visit::rewrite_projection(&mut rewriter, projection).unwrap_or_else(|never: Infallible| match never {}))
    })
}

#[derive(Default)]
struct RedundantColumns {
    /// `(alias, dropped column)` -> surviving column
    renames: HashMap<(String, String), String>,
    depth: usize,
}

impl Rewriter for RedundantColumns {
    type Error = Infallible;

    fn rewrite_select(&mut self, select: &Arc<Select>) -> std::result::Result<Arc<Select>, Infallible> {
        self.depth += 1;
        let rewritten = visit::rewrite_select_children(self, select);
        self.depth -= 1;
        let rewritten = rewritten?;

        // top select: one column per mapped member, duplicates or not
        if self.depth == 0 {
            return Ok(rewritten);
        }

        let mut kept: Vec<ColumnDeclaration> = Vec::with_capacity(rewritten.columns.len());
        for column in &rewritten.columns {
            match kept.iter().find(|k| k.expr == column.expr) {
                Some(survivor) => {
                    debug!(alias = %rewritten.alias, column = %column.name, survivor = %survivor.name, "dropping redundant column");
                    self.renames
                        .insert((rewritten.alias.clone(), column.name.clone()), survivor.name.clone());
                }
                None => kept.push(column.clone()),
            }
        }

        if kept.len() == rewritten.columns.len() {
            return Ok(rewritten);
        }
        let mut deduped = Select::clone(&rewritten);
        deduped.columns = kept;
        Ok(Arc::new(deduped))
    }

    fn rewrite_expr(&mut self, expr: &Expr) -> std::result::Result<Expr, Infallible> {
        if let Expr::Column { alias, name } = expr {
            if let Some(survivor) = self.renames.get(&(alias.clone(), name.clone())) {
                return Ok(Expr::column(alias, survivor));
            }
        }
        visit::rewrite_expr_children(self, expr)
    }
}

/// Which columns are read, and which selects must keep all of theirs
#[derive(Debug, Default)]
pub struct ColumnUsage {
    used: HashSet<(String, String)>,
    pinned: HashSet<String>,
    top: String,
}

impl ColumnUsage {
    pub fn analyze(projection: &Projection) -> Self {
        let mut usage = ColumnUsage {
            top: projection.select.alias.clone(),
            ..Default::default()
        };
        visit::walk_projection(&mut usage, projection);
        usage
    }

    pub fn is_used(&self, alias: &str, name: &str) -> bool {
        self.used.contains(&(alias.to_string(), name.to_string()))
    }

    /// Selects whose column list may not shrink
    pub fn is_pinned(&self, alias: &str) -> bool {
        alias == self.top || self.pinned.contains(alias)
    }
}

impl<'ir> Visitor<'ir> for ColumnUsage {
    fn visit_select(&mut self, select: &'ir Select) {
        if select.distinct {
            self.pinned.insert(select.alias.clone());
        }
        visit::walk_select(self, select);
    }

    fn visit_expr(&mut self, expr: &'ir Expr) {
        match expr {
            Expr::Column { alias, name } => {
                self.used.insert((alias.clone(), name.clone()));
            }
            Expr::ScalarSubquery { select } | Expr::Exists { select } | Expr::InSubquery { select, .. } => {
                self.pinned.insert(select.alias.clone());
            }
            _ => {}
        }
        visit::walk_expr(self, expr);
    }
}

/// Drop unreferenced subquery columns until a fixed point
pub fn remove_unused_columns(statement: &Statement) -> Result<Statement> {
    statement.try_map_queries(&mut |projection| {
        let mut current = projection.clone();
        loop {
            let usage = ColumnUsage::analyze(&current);
            let mut filter = ColumnFilter {
                keep: |alias: &str, column: &ColumnDeclaration| {
                    usage.is_pinned(alias) || usage.is_used(alias, &column.name)
                },
            };
            let next = visit::rewrite_projection(&mut filter, &current).unwrap_or_else(|never| match never {});
            if Arc::ptr_eq(&next.select, &current.select) {
                return Ok(current);
            }
            current = next;
        }
    })
}

/// Remove one column from a subquery of `projection`
///
/// Fails when the column is referenced, belongs to a select whose columns are
/// pinned, or does not exist.
pub fn remove_column(projection: &Projection, alias: &str, name: &str) -> Result<Projection> {
    let usage = ColumnUsage::analyze(projection);
    if usage.is_pinned(alias) {
        return Err(TranslateError::inconsistent(format!(
            "cannot remove '{alias}.{name}': the columns of '{alias}' are fixed"
        )));
    }
    if usage.is_used(alias, name) {
        return Err(TranslateError::inconsistent(format!(
            "cannot remove '{alias}.{name}': it is still referenced"
        )));
    }

    let mut filter = ColumnFilter {
        keep: |owner: &str, column: &ColumnDeclaration| owner != alias || column.name != name,
    };
    let pruned = visit::rewrite_projection(&mut filter, projection).unwrap_or_else(|never| match never {});
    if Arc::ptr_eq(&pruned.select, &projection.select) {
        return Err(TranslateError::inconsistent(format!("no column '{alias}.{name}' to remove")));
    }
    Ok(pruned)
}

struct ColumnFilter<F> {
    keep: F,
}

impl<F> Rewriter for ColumnFilter<F>
where
    F: FnMut(&str, &ColumnDeclaration) -> bool,
{
    type Error = Infallible;

    fn rewrite_select(&mut self, select: &Arc<Select>) -> std::result::Result<Arc<Select>, Infallible> {
        let rewritten = visit::rewrite_select_children(self, select)?;

        let alias = rewritten.alias.as_str();
        let mut columns: Vec<_> = rewritten
            .columns
            .iter()
            .filter(|c| (self.keep)(alias, *c))
            .cloned()
            .collect();
        if columns.len() == rewritten.columns.len() {
            return Ok(rewritten);
        }
        if columns.is_empty() {
            // a select needs at least one column
            columns.push(rewritten.columns[0].clone());
        }

        debug!(
            alias = %rewritten.alias,
            removed = rewritten.columns.len() - columns.len(),
            "pruned unused columns"
        );
        let mut pruned = Select::clone(&rewritten);
        pruned.columns = columns;
        Ok(visit::share(&rewritten, pruned))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;
    use hql_ir::{AggregateFunc, DataType, Projector, Source};

    fn columns(select: &Select) -> Vec<&str> {
        select.columns.iter().map(|c| c.name.as_str()).collect()
    }

    fn top(stmt: &Statement) -> Arc<Select> {
        stmt.queries()[0].select.clone()
    }

    fn with_column(mut select: Select, name: &str, expr: Expr) -> Select {
        select.columns.push(ColumnDeclaration::new(name, expr, DataType::Unknown));
        select
    }

    #[test]
    fn test_redundant_column_redirected() {
        let inner = with_column(orders_select("t1", "t0"), "c0", Expr::column("t0", "Id"));
        let mut outer = passthrough("t2", &inner);
        outer.columns[1].expr = Expr::column("t1", "c0");

        let stmt = remove_redundant_columns(&order_query(outer)).unwrap();
        let outer = top(&stmt);
        assert_eq!(columns(subquery_of(&outer)), vec!["Id", "Amount"]);
        assert_eq!(outer.columns[1].expr, Expr::column("t1", "Id"));
    }

    #[test]
    fn test_top_select_keeps_duplicates() {
        let mut select = orders_select("t1", "t0");
        select.columns[1].expr = Expr::column("t0", "Id");

        let stmt = order_query(select);
        let pruned = remove_redundant_columns(&stmt).unwrap();
        assert!(Arc::ptr_eq(&top(&stmt), &top(&pruned)));
    }

    #[test]
    fn test_unused_columns_removed_transitively() {
        let innermost = with_column(orders_select("t1", "t0"), "Region", Expr::column("t0", "Region"));
        let middle = passthrough("t2", &innermost);
        let mut middle = with_column(middle, "Shout", Expr::column("t1", "Region"));
        middle.columns.remove(2);
        let mut outer = passthrough("t3", &middle);
        outer.columns.truncate(2);

        let stmt = remove_unused_columns(&order_query(outer)).unwrap();
        let outer = top(&stmt);
        let middle = subquery_of(&outer);
        assert_eq!(columns(middle), vec!["Id", "Amount"]);
        assert_eq!(columns(subquery_of(middle)), vec!["Id", "Amount"]);
    }

    #[test]
    fn test_distinct_subquery_is_pinned() {
        let inner = with_column(orders_select("t1", "t0"), "Region", Expr::column("t0", "Region")).with_distinct(true);
        let mut outer = passthrough("t2", &inner);
        outer.columns.truncate(2);

        let stmt = order_query(outer);
        let pruned = remove_unused_columns(&stmt).unwrap();
        assert_eq!(columns(subquery_of(&top(&pruned))), vec!["Id", "Amount", "Region"]);
    }

    #[test]
    fn test_last_column_survives() {
        let inner = orders_select("t1", "t0");
        let count = Expr::Aggregate { func: AggregateFunc::Count, arg: None, distinct: false };
        let outer = Select::new(
            "t2",
            vec![ColumnDeclaration::new("n", count, DataType::BigInt)],
            Some(Source::subquery(inner)),
        );
        let stmt = Statement::Query(Projection {
            select: Arc::new(outer),
            projector: Projector::Scalar { expr: Expr::column("t2", "n") },
        });

        let pruned = remove_unused_columns(&stmt).unwrap();
        assert_eq!(columns(subquery_of(&top(&pruned))), vec!["Id"]);
    }

    #[test]
    fn test_unused_removal_idempotent() {
        let inner = with_column(orders_select("t1", "t0"), "Region", Expr::column("t0", "Region"));
        let mut outer = passthrough("t2", &inner);
        outer.columns.truncate(2);

        let once = remove_unused_columns(&order_query(outer)).unwrap();
        let twice = remove_unused_columns(&once).unwrap();
        assert!(Arc::ptr_eq(&top(&once), &top(&twice)));
    }

    #[test]
    fn test_remove_column_guards() {
        let inner = with_column(orders_select("t1", "t0"), "Region", Expr::column("t0", "Region"));
        let mut outer = passthrough("t2", &inner);
        outer.columns.truncate(2);
        let stmt = order_query(outer);
        let projection = stmt.queries()[0];

        let err = remove_column(projection, "t1", "Id").unwrap_err();
        assert!(matches!(err, TranslateError::InternalConsistency(_)));
        assert!(remove_column(projection, "t2", "Id").is_err());
        assert!(remove_column(projection, "t1", "Missing").is_err());

        let pruned = remove_column(projection, "t1", "Region").unwrap();
        assert_eq!(columns(subquery_of(&pruned.select)), vec!["Id", "Amount"]);
    }

    #[test]
    fn test_usage_pins_expression_subqueries() {
        let lookup = orders_select("t3", "t4");
        let mut select = orders_select("t1", "t0");
        select.filter = Some(Expr::Exists { select: Arc::new(lookup) });
        let stmt = order_query(select);

        let usage = ColumnUsage::analyze(stmt.queries()[0]);
        assert!(usage.is_pinned("t3"));
        assert!(usage.is_pinned("t1"));
        assert!(usage.is_used("t0", "Amount"));
        assert!(!usage.is_used("t3", "Id"));
    }
}
