//! Structural checks run on the output of the pass pipeline
//!
//! A tree that fails here is never formatted: every column reference must
//! resolve to a declaration in scope, the projector may only read the top
//! select's columns, aliases are unique within a query and column names are
//! unique within a select.

use crate::error::{Result, TranslateError};
use crate::scope::Scope;
use hql_ir::visit::{self, Visitor};
use hql_ir::{Expr, Projection, Select, Source, Statement};
use std::collections::HashSet;
use std::sync::Arc;

pub fn validate(statement: &Statement) -> Result<()> {
    for projection in statement.queries() {
        validate_projection(projection)?;
    }
    Ok(())
}

pub fn validate_projection(projection: &Projection) -> Result<()> {
    check_unique_aliases(projection)?;

    let mut scope = Scope::new();
    check_select(&projection.select, &mut scope)?;

    let top = Source::Subquery {
        select: Arc::clone(&projection.select),
    };
    scope.push(Some(&top));
    for expr in projection.projector.exprs() {
        scope
            .resolve_expr(expr)
            .map_err(|e| TranslateError::inconsistent(format!("projector: {e}")))?;
    }
    scope.pop();
    Ok(())
}

fn check_select(select: &Select, scope: &mut Scope) -> Result<()> {
    let mut names = HashSet::new();
    for column in &select.columns {
        if !names.insert(column.name.as_str()) {
            return Err(TranslateError::inconsistent(format!(
                "select '{}' declares column '{}' twice",
                select.alias, column.name
            )));
        }
    }

    if let Some(from) = &select.from {
        check_source(from, scope)?;
    }

    scope.push(select.from.as_ref());
    let result = check_exprs(select, scope);
    scope.pop();
    result
}

fn check_source(source: &Source, scope: &mut Scope) -> Result<()> {
    match source {
        Source::Table { .. } => Ok(()),
        Source::Subquery { select } => check_select(select, scope),
        Source::Join { left, right, .. } => {
            check_source(left, scope)?;
            check_source(right, scope)
        }
    }
}

fn check_exprs(select: &Select, scope: &mut Scope) -> Result<()> {
    let mut exprs: Vec<&Expr> = select.columns.iter().map(|c| &c.expr).collect();
    exprs.extend(&select.filter);
    exprs.extend(select.order_by.iter().map(|t| &t.expr));
    exprs.extend(&select.group_by);
    exprs.extend(&select.cluster_by);
    exprs.extend(join_conditions(select.from.as_ref()));

    for expr in exprs {
        scope
            .resolve_expr(expr)
            .map_err(|e| TranslateError::inconsistent(format!("select '{}': {e}", select.alias)))?;
        // expression subqueries see the enclosing scope
        for subquery in expr_subqueries(expr) {
            check_select(subquery, scope)?;
        }
    }
    Ok(())
}

fn join_conditions(source: Option<&Source>) -> Vec<&Expr> {
    match source {
        Some(Source::Join { left, right, on, .. }) => {
            let mut conditions = join_conditions(Some(left.as_ref()));
            conditions.extend(join_conditions(Some(right.as_ref())));
            conditions.extend(on);
            conditions
        }
        _ => Vec::new(),
    }
}

/// Subqueries directly under `expr`, not those nested inside them
fn expr_subqueries(expr: &Expr) -> Vec<&Select> {
    struct Subqueries<'ir>(Vec<&'ir Select>);

    impl<'ir> Visitor<'ir> for Subqueries<'ir> {
        fn visit_select(&mut self, select: &'ir Select) {
            self.0.push(select);
        }
    }

    let mut found = Subqueries(Vec::new());
    found.visit_expr(expr);
    found.0
}

fn check_unique_aliases(projection: &Projection) -> Result<()> {
    struct Aliases<'ir> {
        seen: HashSet<&'ir str>,
        duplicate: Option<&'ir str>,
    }

    impl<'ir> Aliases<'ir> {
        fn declare(&mut self, alias: &'ir str) {
            if !self.seen.insert(alias) && self.duplicate.is_none() {
                self.duplicate = Some(alias);
            }
        }
    }

    impl<'ir> Visitor<'ir> for Aliases<'ir> {
        fn visit_select(&mut self, select: &'ir Select) {
            self.declare(&select.alias);
            visit::walk_select(self, select);
        }

        fn visit_source(&mut self, source: &'ir Source) {
            if let Source::Table { alias, .. } = source {
                self.declare(alias);
            }
            visit::walk_source(self, source);
        }
    }

    let mut aliases = Aliases {
        seen: HashSet::new(),
        duplicate: None,
    };
    visit::walk_projection(&mut aliases, projection);
    match aliases.duplicate {
        Some(alias) => Err(TranslateError::inconsistent(format!("alias '{alias}' is declared twice"))),
        None => Ok(()),
    }
}
