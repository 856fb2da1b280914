//! Tree traversal
//!
//! [`Visitor`] walks a tree read-only; [`Rewriter`] rebuilds it bottom-up.
//! Both come with `walk_*` / `rewrite_*_children` functions that implementors
//! call from their overrides to continue into child nodes, so every pass handles
//! or explicitly passes through every node kind.

use crate::{Expr, OrderTerm, Projection, Projector, MemberBinding, Select, Source, Statement, When};
use std::collections::HashSet;
use std::sync::Arc;

pub trait Visitor<'ir> {
    fn visit_select(&mut self, select: &'ir Select) {
        walk_select(self, select)
    }

    fn visit_source(&mut self, source: &'ir Source) {
        walk_source(self, source)
    }

    fn visit_expr(&mut self, expr: &'ir Expr) {
        walk_expr(self, expr)
    }
}

pub fn walk_statement<'ir, V: Visitor<'ir> + ?Sized>(visitor: &mut V, statement: &'ir Statement) {
    for projection in statement.queries() {
        walk_projection(visitor, projection);
    }
}

pub fn walk_projection<'ir, V: Visitor<'ir> + ?Sized>(visitor: &mut V, projection: &'ir Projection) {
    visitor.visit_select(&projection.select);
    for expr in projection.projector.exprs() {
        visitor.visit_expr(expr);
    }
}

pub fn walk_select<'ir, V: Visitor<'ir> + ?Sized>(visitor: &mut V, select: &'ir Select) {
    if let Some(from) = &select.from {
        visitor.visit_source(from);
    }
    for column in &select.columns {
        visitor.visit_expr(&column.expr);
    }
    if let Some(filter) = &select.filter {
        visitor.visit_expr(filter);
    }
    for term in &select.order_by {
        visitor.visit_expr(&term.expr);
    }
    for expr in select.group_by.iter().chain(&select.cluster_by) {
        visitor.visit_expr(expr);
    }
}

pub fn walk_source<'ir, V: Visitor<'ir> + ?Sized>(visitor: &mut V, source: &'ir Source) {
    match source {
        Source::Table { .. } => {}
        Source::Subquery { select } => visitor.visit_select(select),
        Source::Join { left, right, on, .. } => {
            visitor.visit_source(left);
            visitor.visit_source(right);
            if let Some(on) = on {
                visitor.visit_expr(on);
            }
        }
    }
}

pub fn walk_expr<'ir, V: Visitor<'ir> + ?Sized>(visitor: &mut V, expr: &'ir Expr) {
    match expr {
        Expr::Column { .. } | Expr::Literal { .. } | Expr::GeneratedId { .. } => {}
        Expr::Binary { left, right, .. } => {
            visitor.visit_expr(left);
            visitor.visit_expr(right);
        }
        Expr::Unary { expr, .. } | Expr::IsNull { expr, .. } | Expr::Cast { expr, .. } => {
            visitor.visit_expr(expr)
        }
        Expr::Case { whens, otherwise } => {
            for when in whens {
                visitor.visit_expr(&when.condition);
                visitor.visit_expr(&when.result);
            }
            if let Some(otherwise) = otherwise {
                visitor.visit_expr(otherwise);
            }
        }
        Expr::Function { args, .. } => {
            for arg in args {
                visitor.visit_expr(arg);
            }
        }
        Expr::Aggregate { arg, .. } => {
            if let Some(arg) = arg {
                visitor.visit_expr(arg);
            }
        }
        Expr::RowNumber { order_by } => {
            for term in order_by {
                visitor.visit_expr(&term.expr);
            }
        }
        Expr::ScalarSubquery { select } | Expr::Exists { select } => visitor.visit_select(select),
        Expr::InSubquery { expr, select } => {
            visitor.visit_expr(expr);
            visitor.visit_select(select);
        }
    }
}

/// Every select and table alias declared anywhere in the statement
pub fn collect_aliases(statement: &Statement) -> HashSet<String> {
    struct Aliases(HashSet<String>);

    impl<'ir> Visitor<'ir> for Aliases {
        fn visit_select(&mut self, select: &'ir Select) {
            self.0.insert(select.alias.clone());
            walk_select(self, select);
        }

        fn visit_source(&mut self, source: &'ir Source) {
            if let Source::Table { alias, .. } = source {
                self.0.insert(alias.clone());
            }
            walk_source(self, source);
        }
    }

    let mut aliases = Aliases(HashSet::new());
    walk_statement(&mut aliases, statement);
    aliases.0
}

/// `(alias, name)` of every column reference under `expr`, subqueries included
pub fn column_refs(expr: &Expr) -> Vec<(&str, &str)> {
    struct Refs<'ir>(Vec<(&'ir str, &'ir str)>);

    impl<'ir> Visitor<'ir> for Refs<'ir> {
        fn visit_expr(&mut self, expr: &'ir Expr) {
            if let Expr::Column { alias, name } = expr {
                self.0.push((alias.as_str(), name.as_str()));
            }
            walk_expr(self, expr);
        }
    }

    let mut refs = Refs(Vec::new());
    refs.visit_expr(expr);
    refs.0
}

pub trait Rewriter {
    type Error;

    fn rewrite_select(&mut self, select: &Arc<Select>) -> Result<Arc<Select>, Self::Error> {
        rewrite_select_children(self, select)
    }

    fn rewrite_expr(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        rewrite_expr_children(self, expr)
    }
}

/// Keep the original node when a rewrite produced a structurally equal one
pub fn share(original: &Arc<Select>, rebuilt: Select) -> Arc<Select> {
    if **original == rebuilt {
        Arc::clone(original)
    } else {
        Arc::new(rebuilt)
    }
}

pub fn rewrite_projection<R: Rewriter + ?Sized>(
    rewriter: &mut R,
    projection: &Projection,
) -> Result<Projection, R::Error> {
    Ok(Projection {
        select: rewriter.rewrite_select(&projection.select)?,
        projector: rewrite_projector(rewriter, &projection.projector)?,
    })
}

pub fn rewrite_projector<R: Rewriter + ?Sized>(rewriter: &mut R, projector: &Projector) -> Result<Projector, R::Error> {
    match projector {
        Projector::Entity { entity, members } => Ok(Projector::Entity {
            entity: entity.clone(),
            members: members
                .iter()
                .map(|m| {
                    Ok(MemberBinding {
                        member: m.member.clone(),
                        expr: rewriter.rewrite_expr(&m.expr)?,
                    })
                })
                .collect::<Result<Vec<_>, R::Error>>()?,
        }),
        Projector::Scalar { expr } => Ok(Projector::Scalar {
            expr: rewriter.rewrite_expr(expr)?,
        }),
    }
}

/// Rebuild a select from its rewritten children; the FROM source is rewritten
/// before any expression of the select itself
pub fn rewrite_select_children<R: Rewriter + ?Sized>(
    rewriter: &mut R,
    select: &Arc<Select>,
) -> Result<Arc<Select>, R::Error> {
    let from = select
        .from
        .as_ref()
        .map(|source| rewrite_source(rewriter, source))
        .transpose()?;

    let mut columns = Vec::with_capacity(select.columns.len());
    for column in &select.columns {
        let mut column = column.clone();
        column.expr = rewriter.rewrite_expr(&column.expr)?;
        columns.push(column);
    }

    let rebuilt = Select {
        alias: select.alias.clone(),
        columns,
        from,
        filter: select.filter.as_ref().map(|f| rewriter.rewrite_expr(f)).transpose()?,
        order_by: rewrite_order_terms(rewriter, &select.order_by)?,
        group_by: rewrite_exprs(rewriter, &select.group_by)?,
        cluster_by: rewrite_exprs(rewriter, &select.cluster_by)?,
        distinct: select.distinct,
        skip: select.skip,
        take: select.take,
        reverse: select.reverse,
    };

    Ok(share(select, rebuilt))
}

pub fn rewrite_source<R: Rewriter + ?Sized>(rewriter: &mut R, source: &Source) -> Result<Source, R::Error> {
    match source {
        Source::Table { .. } => Ok(source.clone()),
        Source::Subquery { select } => Ok(Source::Subquery {
            select: rewriter.rewrite_select(select)?,
        }),
        Source::Join { kind, left, right, on } => {
            let left = rewrite_source(rewriter, left)?;
            let right = rewrite_source(rewriter, right)?;
            Ok(Source::Join {
                kind: *kind,
                left: Box::new(left),
                right: Box::new(right),
                on: on.as_ref().map(|on| rewriter.rewrite_expr(on)).transpose()?,
            })
        }
    }
}

pub fn rewrite_order_terms<R: Rewriter + ?Sized>(
    rewriter: &mut R,
    terms: &[OrderTerm],
) -> Result<Vec<OrderTerm>, R::Error> {
    terms
        .iter()
        .map(|term| {
            Ok(OrderTerm {
                expr: rewriter.rewrite_expr(&term.expr)?,
                direction: term.direction,
            })
        })
        .collect()
}

fn rewrite_exprs<R: Rewriter + ?Sized>(rewriter: &mut R, exprs: &[Expr]) -> Result<Vec<Expr>, R::Error> {
    exprs.iter().map(|e| rewriter.rewrite_expr(e)).collect()
}

fn rewrite_boxed<R: Rewriter + ?Sized>(rewriter: &mut R, expr: &Expr) -> Result<Box<Expr>, R::Error> {
    Ok(Box::new(rewriter.rewrite_expr(expr)?))
}

pub fn rewrite_expr_children<R: Rewriter + ?Sized>(rewriter: &mut R, expr: &Expr) -> Result<Expr, R::Error> {
    let rewritten = match expr {
        Expr::Column { .. } | Expr::Literal { .. } | Expr::GeneratedId { .. } => expr.clone(),
        Expr::Binary { op, left, right } => Expr::Binary {
            op: *op,
            left: rewrite_boxed(rewriter, left)?,
            right: rewrite_boxed(rewriter, right)?,
        },
        Expr::Unary { op, expr } => Expr::Unary {
            op: *op,
            expr: rewrite_boxed(rewriter, expr)?,
        },
        Expr::IsNull { expr, negated } => Expr::IsNull {
            expr: rewrite_boxed(rewriter, expr)?,
            negated: *negated,
        },
        Expr::Cast { expr, data_type } => Expr::Cast {
            expr: rewrite_boxed(rewriter, expr)?,
            data_type: data_type.clone(),
        },
        Expr::Case { whens, otherwise } => Expr::Case {
            whens: whens
                .iter()
                .map(|w| {
                    Ok(When {
                        condition: rewriter.rewrite_expr(&w.condition)?,
                        result: rewriter.rewrite_expr(&w.result)?,
                    })
                })
                .collect::<Result<Vec<_>, R::Error>>()?,
            otherwise: otherwise.as_ref().map(|e| rewrite_boxed(rewriter, e)).transpose()?,
        },
        Expr::Function { name, args, resource } => Expr::Function {
            name: name.clone(),
            args: rewrite_exprs(rewriter, args)?,
            resource: resource.clone(),
        },
        Expr::Aggregate { func, arg, distinct } => Expr::Aggregate {
            func: *func,
            arg: arg.as_ref().map(|a| rewrite_boxed(rewriter, a)).transpose()?,
            distinct: *distinct,
        },
        Expr::RowNumber { order_by } => Expr::RowNumber {
            order_by: rewrite_order_terms(rewriter, order_by)?,
        },
        Expr::ScalarSubquery { select } => Expr::ScalarSubquery {
            select: rewriter.rewrite_select(select)?,
        },
        Expr::Exists { select } => Expr::Exists {
            select: rewriter.rewrite_select(select)?,
        },
        Expr::InSubquery { expr, select } => Expr::InSubquery {
            expr: rewrite_boxed(rewriter, expr)?,
            select: rewriter.rewrite_select(select)?,
        },
    };
    Ok(rewritten)
}
