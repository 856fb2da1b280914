//! Alias scopes for resolving column references

use hql_ir::{Expr, Source};
use std::collections::HashMap;

#[derive(Debug, Clone)]
enum Visible {
    /// Base table: any column name resolves
    Table,
    Columns(Vec<String>),
}

/// Stack of FROM scopes, innermost last
#[derive(Debug, Default)]
pub(crate) struct Scope {
    frames: Vec<HashMap<String, Visible>>,
}

impl Scope {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Open a frame holding every alias `source` declares
    pub(crate) fn push(&mut self, source: Option<&Source>) {
        let mut frame = HashMap::new();
        if let Some(source) = source {
            declare(source, &mut frame);
        }
        self.frames.push(frame);
    }

    pub(crate) fn pop(&mut self) {
        self.frames.pop();
    }

    /// Resolve one reference against the innermost frame declaring its alias
    pub(crate) fn resolve(&self, alias: &str, name: &str) -> Result<(), String> {
        match self.frames.iter().rev().find_map(|frame| frame.get(alias)) {
            Some(Visible::Table) => Ok(()),
            Some(Visible::Columns(columns)) if columns.iter().any(|c| c == name) => Ok(()),
            Some(Visible::Columns(_)) => Err(format!("'{alias}' declares no column '{name}'")),
            None => Err(format!("alias '{alias}' is not in scope for '{alias}.{name}'")),
        }
    }

    /// Resolve the references of `expr` that do not belong to its own subqueries
    pub(crate) fn resolve_expr(&self, expr: &Expr) -> Result<(), String> {
        for (alias, name) in local_refs(expr) {
            self.resolve(alias, name)?;
        }
        Ok(())
    }
}

fn declare(source: &Source, frame: &mut HashMap<String, Visible>) {
    match source {
        Source::Table { alias, .. } => {
            frame.insert(alias.clone(), Visible::Table);
        }
        Source::Subquery { select } => {
            let columns = select.columns.iter().map(|c| c.name.clone()).collect();
            frame.insert(select.alias.clone(), Visible::Columns(columns));
        }
        Source::Join { left, right, .. } => {
            declare(left, frame);
            declare(right, frame);
        }
    }
}

/// References made directly by `expr`, not descending into subqueries
fn local_refs(expr: &Expr) -> Vec<(&str, &str)> {
    let mut refs = Vec::new();
    collect_local(expr, &mut refs);
    refs
}

fn collect_local<'e>(expr: &'e Expr, refs: &mut Vec<(&'e str, &'e str)>) {
    match expr {
        Expr::Column { alias, name } => refs.push((alias.as_str(), name.as_str())),
        Expr::Literal { .. }
        | Expr::GeneratedId { .. }
        | Expr::ScalarSubquery { .. }
        | Expr::Exists { .. } => {}
        Expr::Binary { left, right, .. } => {
            collect_local(left, refs);
            collect_local(right, refs);
        }
        Expr::Unary { expr, .. }
        | Expr::IsNull { expr, .. }
        | Expr::Cast { expr, .. }
        | Expr::InSubquery { expr, .. } => collect_local(expr, refs),
        Expr::Case { whens, otherwise } => {
            for when in whens {
                collect_local(&when.condition, refs);
                collect_local(&when.result, refs);
            }
            if let Some(otherwise) = otherwise {
                collect_local(otherwise, refs);
            }
        }
        Expr::Function { args, .. } => args.iter().for_each(|a| collect_local(a, refs)),
        Expr::Aggregate { arg, .. } => {
            if let Some(arg) = arg {
                collect_local(arg, refs);
            }
        }
        Expr::RowNumber { order_by } => order_by.iter().for_each(|t| collect_local(&t.expr, refs)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hql_ir::{ColumnDeclaration, DataType, JoinKind, Select};

    fn scope() -> Scope {
        let sub = Select::new(
            "t1",
            vec![ColumnDeclaration::new("Id", Expr::column("t0", "Id"), DataType::Int)],
            Some(Source::table("Orders", "t0")),
        );
        let join = Source::Join {
            kind: JoinKind::Inner,
            left: Box::new(Source::subquery(sub)),
            right: Box::new(Source::table("Customers", "t2")),
            on: None,
        };
        let mut scope = Scope::new();
        scope.push(Some(&join));
        scope
    }

    #[test]
    fn test_resolves_tables_and_subquery_columns() {
        let scope = scope();
        assert!(scope.resolve("t2", "anything").is_ok());
        assert!(scope.resolve("t1", "Id").is_ok());
        assert!(scope.resolve("t1", "Amount").is_err());
        // t0 lives inside the subquery only
        assert!(scope.resolve("t0", "Id").is_err());
    }

    #[test]
    fn test_inner_frames_see_outer_aliases() {
        let mut scope = scope();
        scope.push(Some(&Source::table("Items", "t5")));
        assert!(scope.resolve("t1", "Id").is_ok());
        scope.pop();
        assert!(scope.resolve("t5", "Sku").is_err());
    }
}
