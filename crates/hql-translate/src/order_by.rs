//! ORDER BY placement
//!
//! Hive, like SQL in general, does not preserve the order of a subquery's rows
//! once they are read by an enclosing select. Orderings therefore have to sit on
//! the outermost select, or on a select whose skip/take depends on them.
//!
//! The normalizer walks each select bottom-up:
//!
//! - orderings of FROM subqueries are lifted into the enclosing select, after its
//!   own terms, re-expressed through the subquery's columns (a `c0`, `c1`, ...
//!   column is added to the subquery when none carries the term's expression);
//! - grouped, DISTINCT and aggregating selects neither pass orderings on nor
//!   receive them;
//! - orderings of expression subqueries without skip/take are discarded;
//! - a `reverse` select has its terms flipped and the flag cleared.
//!
//! Applying the pass to its own output returns an equal tree.

use crate::error::{Result, TranslateError};
use crate::naming::numbered_column_name;
use crate::scope::Scope;
use hql_ir::visit::{self, Rewriter};
use hql_ir::{ColumnDeclaration, DataType, OrderTerm, Projection, Select, Source, Statement};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    /// Select read by the projector
    Outermost,
    /// Subquery in a FROM clause
    Source,
    /// Subquery inside an expression (scalar, EXISTS, IN)
    Expression,
}

/// Move every ordering to a select where Hive honours it
pub fn normalize_order_by(statement: &Statement) -> Result<Statement> {
    statement.try_map_queries(&mut |projection| {
        let mut normalizer = OrderByNormalizer { scope: Scope::new() };
        let (select, _) = normalizer.normalize(&projection.select, Placement::Outermost)?;
        Ok(Projection {
            select,
            projector: projection.projector.clone(),
        })
    })
}

struct OrderByNormalizer {
    scope: Scope,
}

impl Rewriter for OrderByNormalizer {
    type Error = TranslateError;

    // Only expression subqueries reach this; FROM subqueries go through `normalize_source`.
    fn rewrite_select(&mut self, select: &Arc<Select>) -> Result<Arc<Select>> {
        self.normalize(select, Placement::Expression).map(|(select, _)| select)
    }
}

impl OrderByNormalizer {
    /// Returns the normalized select and the terms it passes on to its parent,
    /// expressed in the select's own FROM scope
    fn normalize(&mut self, select: &Arc<Select>, placement: Placement) -> Result<(Arc<Select>, Vec<OrderTerm>)> {
        let mut gathered = Vec::new();
        let from = select
            .from
            .as_ref()
            .map(|source| self.normalize_source(source, &mut gathered))
            .transpose()?;

        self.scope.push(from.as_ref());
        let normalized = self.normalize_clauses(select, from, gathered, placement);
        self.scope.pop();
        normalized
    }

    fn normalize_clauses(
        &mut self,
        select: &Arc<Select>,
        from: Option<Source>,
        gathered: Vec<OrderTerm>,
        placement: Placement,
    ) -> Result<(Arc<Select>, Vec<OrderTerm>)> {
        let mut columns = Vec::with_capacity(select.columns.len());
        for column in &select.columns {
            columns.push(ColumnDeclaration {
                expr: self.rewrite_expr(&column.expr)?,
                ..column.clone()
            });
        }
        let filter = select.filter.as_ref().map(|f| self.rewrite_expr(f)).transpose()?;
        let group_by = select.group_by.iter().map(|e| self.rewrite_expr(e)).collect::<Result<Vec<_>>>()?;
        let cluster_by = select.cluster_by.iter().map(|e| self.rewrite_expr(e)).collect::<Result<Vec<_>>>()?;

        let own = visit::rewrite_order_terms(self, &select.order_by)?;
        for term in &own {
            self.scope.resolve_expr(&term.expr).map_err(|reason| {
                TranslateError::inconsistent(format!(
                    "order term of select '{}' cannot be resolved: {}",
                    select.alias, reason
                ))
            })?;
        }

        // rows of these selects no longer correspond to their source's rows
        let collapses_rows = !select.group_by.is_empty() || select.distinct || select.has_aggregates();
        let can_have_order = placement == Placement::Outermost || select.has_paging();
        let can_pass_on = placement == Placement::Source && !collapses_rows;
        let can_receive = can_have_order && !collapses_rows;

        if !gathered.is_empty() && !can_receive && !can_pass_on {
            warn!(alias = %select.alias, dropped = gathered.len(), "subquery ordering has no effect here, dropped");
        }

        let mut own = dedupe(own);
        let mut combined = own.clone();
        combined.extend(gathered);
        let mut combined = dedupe(combined);

        if select.reverse {
            reverse(&mut own);
            reverse(&mut combined);
        }

        let order_by = if can_receive {
            combined.clone()
        } else if can_have_order {
            own
        } else {
            if !own.is_empty() {
                debug!(alias = %select.alias, "ordering without skip/take removed from subquery");
            }
            Vec::new()
        };
        let passed = if can_pass_on { combined } else { Vec::new() };

        let rebuilt = Select {
            alias: select.alias.clone(),
            columns,
            from,
            filter,
            order_by,
            group_by,
            cluster_by,
            distinct: select.distinct,
            skip: select.skip,
            take: select.take,
            reverse: false,
        };
        Ok((visit::share(select, rebuilt), passed))
    }

    fn normalize_source(&mut self, source: &Source, gathered: &mut Vec<OrderTerm>) -> Result<Source> {
        match source {
            Source::Table { .. } => Ok(source.clone()),
            Source::Subquery { select } => {
                let (child, passed) = self.normalize(select, Placement::Source)?;
                if passed.is_empty() {
                    return Ok(Source::Subquery { select: child });
                }
                let (child, lifted) = expose(&child, passed);
                debug!(alias = %child.alias, lifted = lifted.len(), "lifted subquery ordering");
                gathered.extend(lifted);
                Ok(Source::Subquery { select: child })
            }
            Source::Join { kind, left, right, on } => {
                let left = self.normalize_source(left, gathered)?;
                let right = self.normalize_source(right, gathered)?;
                let mut join = Source::Join {
                    kind: *kind,
                    left: Box::new(left),
                    right: Box::new(right),
                    on: None,
                };
                if let Some(on) = on {
                    self.scope.push(Some(&join));
                    let rewritten = self.rewrite_expr(on);
                    self.scope.pop();
                    if let Source::Join { on: slot, .. } = &mut join {
                        *slot = Some(rewritten?);
                    }
                }
                Ok(join)
            }
        }
    }
}

/// Re-express `terms` (valid inside `child`) as references to `child`'s columns
fn expose(child: &Arc<Select>, terms: Vec<OrderTerm>) -> (Arc<Select>, Vec<OrderTerm>) {
    let mut select = (**child).clone();
    let mut lifted = Vec::with_capacity(terms.len());

    for term in terms {
        let name = match select.column_for_expr(&term.expr) {
            Some(column) => column.name.clone(),
            None => {
                let name = numbered_column_name(&select.columns, "c");
                select
                    .columns
                    .push(ColumnDeclaration::new(name.clone(), term.expr.clone(), DataType::Unknown));
                name
            }
        };
        lifted.push(OrderTerm {
            expr: select.column_ref(&name),
            direction: term.direction,
        });
    }

    (visit::share(child, select), lifted)
}

/// Drop terms whose expression already orders the rows; the first one wins
fn dedupe(terms: Vec<OrderTerm>) -> Vec<OrderTerm> {
    let mut kept: Vec<OrderTerm> = Vec::with_capacity(terms.len());
    for term in terms {
        if !kept.iter().any(|k| k.expr == term.expr) {
            kept.push(term);
        }
    }
    kept
}

fn reverse(terms: &mut [OrderTerm]) {
    for term in terms {
        term.direction = term.direction.reversed();
    }
}
