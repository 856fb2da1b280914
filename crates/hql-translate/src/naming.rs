//! Fresh aliases and column names for synthesized nodes

use hql_ir::{visit, ColumnDeclaration, Statement};
use std::collections::HashSet;

/// Hands out `t0`, `t1`, ... skipping every alias already present in the tree
pub(crate) struct AliasGenerator {
    taken: HashSet<String>,
    next: usize,
}

impl AliasGenerator {
    pub(crate) fn for_statement(statement: &Statement) -> Self {
        Self {
            taken: visit::collect_aliases(statement),
            next: 0,
        }
    }

    pub(crate) fn fresh(&mut self) -> String {
        loop {
            let candidate = format!("t{}", self.next);
            self.next += 1;
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}

fn in_use(columns: &[ColumnDeclaration], name: &str) -> bool {
    columns.iter().any(|c| c.name == name)
}

/// `base` itself, or `base` followed by the first free number
pub(crate) fn available_column_name(columns: &[ColumnDeclaration], base: &str) -> String {
    if !in_use(columns, base) {
        return base.to_string();
    }
    (0..)
        .map(|n| format!("{base}{n}"))
        .find(|name| !in_use(columns, name))
        .unwrap_or_else(|| base.to_string())
}

/// First free `prefix0`, `prefix1`, ...
pub(crate) fn numbered_column_name(columns: &[ColumnDeclaration], prefix: &str) -> String {
    (0..)
        .map(|n| format!("{prefix}{n}"))
        .find(|name| !in_use(columns, name))
        .unwrap_or_else(|| prefix.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hql_ir::{DataType, Expr, Projection, Projector, Select, Source};
    use std::sync::Arc;

    fn col(name: &str) -> ColumnDeclaration {
        ColumnDeclaration::new(name, Expr::int(1), DataType::Int)
    }

    #[test]
    fn test_alias_generator_skips_existing() {
        let select = Select::new("t1", vec![col("a")], Some(Source::table("Orders", "t0")));
        let stmt = Statement::Query(Projection {
            select: Arc::new(select),
            projector: Projector::Scalar { expr: Expr::column("t1", "a") },
        });

        let mut aliases = AliasGenerator::for_statement(&stmt);
        assert_eq!(aliases.fresh(), "t2");
        assert_eq!(aliases.fresh(), "t3");
    }

    #[test]
    fn test_column_names() {
        let columns = vec![col("rn"), col("rn0"), col("c0")];
        assert_eq!(available_column_name(&columns, "rn"), "rn1");
        assert_eq!(available_column_name(&columns, "id"), "id");
        assert_eq!(numbered_column_name(&columns, "c"), "c1");
    }
}
