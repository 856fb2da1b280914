//! Resource files referenced by user-defined function calls

use hql_ir::visit::{self, Visitor};
use hql_ir::{Expr, Statement};
use indexmap::IndexSet;

/// Every distinct resource path, in first-encounter order
pub fn extract_file_references(statement: &Statement) -> Vec<String> {
    let mut collector = ResourceCollector::default();
    visit::walk_statement(&mut collector, statement);
    collector.paths.into_iter().map(str::to_string).collect()
}

#[derive(Default)]
struct ResourceCollector<'ir> {
    paths: IndexSet<&'ir str>,
}

impl<'ir> Visitor<'ir> for ResourceCollector<'ir> {
    fn visit_expr(&mut self, expr: &'ir Expr) {
        if let Expr::Function {
            resource: Some(path), ..
        } = expr
        {
            self.paths.insert(path.as_str());
        }
        visit::walk_expr(self, expr);
    }
}
