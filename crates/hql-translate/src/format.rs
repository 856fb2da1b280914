//! HiveQL text generation
//!
//! Pure rendering of a translated tree. Anything Hive cannot express, or that an
//! earlier pass should have removed, is an error rather than questionable text.

use crate::dialect::Dialect;
use crate::error::{Result, TranslateError};
use hql_ir::{
    AggregateFunc, BinOp, ColumnDeclaration, Expr, JoinKind, OrderDirection, OrderTerm, Select, Source, Statement,
    UnOp, Value,
};

const INDENT: usize = 2;

/// Render `statement` as dialect text
pub fn format(statement: &Statement, dialect: &Dialect) -> Result<String> {
    let formatter = Formatter { dialect };
    let queries = statement.queries();

    match queries.as_slice() {
        [] => Err(TranslateError::inconsistent("statement holds no query")),
        [query] => formatter.select(&query.select, 0, Context::Top),
        _ if !dialect.allows_multiple_commands => Err(TranslateError::unsupported(format!(
            "{} accepts a single statement per call, got {}",
            dialect.name,
            queries.len()
        ))),
        _ => {
            let texts = queries
                .iter()
                .map(|q| formatter.select(&q.select, 0, Context::Top))
                .collect::<Result<Vec<_>>>()?;
            Ok(texts.join(";\n"))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    Top,
    From,
    Expression,
}

struct Formatter<'d> {
    dialect: &'d Dialect,
}

impl Formatter<'_> {
    fn select(&self, select: &Select, indent: usize, context: Context) -> Result<String> {
        if select.reverse {
            return Err(TranslateError::inconsistent(format!(
                "select '{}' still carries a reverse flag",
                select.alias
            )));
        }
        if select.skip.is_some_and(|skip| skip > 0) {
            return Err(TranslateError::unsupported(format!(
                "{} has no OFFSET; skip on '{}' was not rewritten",
                self.dialect.name, select.alias
            )));
        }
        if select.from.is_none() && context == Context::Expression && !self.dialect.allows_subquery_in_select_without_from
        {
            return Err(TranslateError::unsupported(format!(
                "{} does not allow subquery '{}' without FROM",
                self.dialect.name, select.alias
            )));
        }

        let pad = " ".repeat(indent);
        let mut lines = Vec::new();

        let columns = select
            .columns
            .iter()
            .map(|c| self.column(c, indent))
            .collect::<Result<Vec<_>>>()?;
        let distinct = if select.distinct { "DISTINCT " } else { "" };
        lines.push(format!("{pad}SELECT {distinct}{}", columns.join(", ")));

        if let Some(from) = &select.from {
            lines.push(format!("{pad}FROM {}", self.source(from, indent)?));
        }
        if let Some(filter) = &select.filter {
            lines.push(format!("{pad}WHERE {}", self.expr(filter, indent)?));
        }
        if !select.group_by.is_empty() {
            lines.push(format!("{pad}GROUP BY {}", self.expr_list(&select.group_by, indent)?));
        }
        if !select.cluster_by.is_empty() {
            lines.push(format!("{pad}CLUSTER BY {}", self.expr_list(&select.cluster_by, indent)?));
        }
        if !select.order_by.is_empty() {
            lines.push(format!("{pad}ORDER BY {}", self.order_terms(&select.order_by, indent)?));
        }
        if let Some(take) = select.take {
            lines.push(format!("{pad}LIMIT {take}"));
        }

        Ok(lines.join("\n"))
    }

    fn column(&self, column: &ColumnDeclaration, indent: usize) -> Result<String> {
        let expr = self.expr(&column.expr, indent)?;
        match &column.expr {
            Expr::Column { name, .. } if *name == column.name => Ok(expr),
            _ => Ok(format!("{expr} AS {}", self.dialect.quote(&column.name))),
        }
    }

    fn source(&self, source: &Source, indent: usize) -> Result<String> {
        match source {
            Source::Table { name, alias } => Ok(format!("{} {}", self.dialect.quote(name), self.dialect.quote(alias))),
            Source::Subquery { select } => Ok(format!(
                "(\n{}\n{}) {}",
                self.select(select, indent + INDENT, Context::From)?,
                " ".repeat(indent),
                self.dialect.quote(&select.alias)
            )),
            Source::Join { kind, left, right, on } => {
                let mut text = format!(
                    "{}\n{}{} {}",
                    self.source(left, indent)?,
                    " ".repeat(indent),
                    join_keyword(*kind),
                    self.source(right, indent)?
                );
                if let Some(on) = on {
                    text.push_str(" ON ");
                    text.push_str(&self.expr(on, indent)?);
                }
                Ok(text)
            }
        }
    }

    fn expr_list(&self, exprs: &[Expr], indent: usize) -> Result<String> {
        let parts = exprs.iter().map(|e| self.expr(e, indent)).collect::<Result<Vec<_>>>()?;
        Ok(parts.join(", "))
    }

    fn order_terms(&self, terms: &[OrderTerm], indent: usize) -> Result<String> {
        let parts = terms
            .iter()
            .map(|term| {
                let expr = self.expr(&term.expr, indent)?;
                Ok(match term.direction {
                    OrderDirection::Ascending => expr,
                    OrderDirection::Descending => format!("{expr} DESC"),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(parts.join(", "))
    }

    fn subquery(&self, select: &Select, indent: usize) -> Result<String> {
        Ok(format!(
            "(\n{}\n{})",
            self.select(select, indent + INDENT, Context::Expression)?,
            " ".repeat(indent)
        ))
    }

    /// Render `expr`, parenthesized when it binds looser than `parent`
    fn operand(&self, expr: &Expr, parent: u8, indent: usize) -> Result<String> {
        let text = self.expr(expr, indent)?;
        if precedence(expr) < parent {
            Ok(format!("({text})"))
        } else {
            Ok(text)
        }
    }

    fn expr(&self, expr: &Expr, indent: usize) -> Result<String> {
        match expr {
            Expr::Column { alias, name } => Ok(format!("{}.{}", self.dialect.quote(alias), self.dialect.quote(name))),
            Expr::Literal { value } => literal(value),
            Expr::Binary { op, left, right } => {
                let p = binary_precedence(*op);
                let left = self.operand(left, p, indent)?;
                // non-associative operators need parentheses on an equal-precedence right side
                let right_floor = if matches!(op, BinOp::And | BinOp::Or | BinOp::Add | BinOp::Mul) { p } else { p + 1 };
                let right = self.operand(right, right_floor, indent)?;
                Ok(format!("{left} {} {right}", binary_symbol(*op)))
            }
            Expr::Unary { op, expr } => {
                let operand = self.operand(expr, ATOM, indent)?;
                Ok(match op {
                    // `--` would start a line comment
                    UnOp::Neg if operand.starts_with('-') => format!("-({operand})"),
                    UnOp::Neg => format!("-{operand}"),
                    UnOp::Not => format!("NOT {operand}"),
                })
            }
            Expr::IsNull { expr, negated } => {
                let operand = self.operand(expr, ATOM, indent)?;
                Ok(if *negated {
                    format!("{operand} IS NOT NULL")
                } else {
                    format!("{operand} IS NULL")
                })
            }
            Expr::Cast { expr, data_type } => Ok(format!("CAST({} AS {data_type})", self.expr(expr, indent)?)),
            Expr::Case { whens, otherwise } => {
                let mut text = String::from("CASE");
                for when in whens {
                    text.push_str(&format!(
                        " WHEN {} THEN {}",
                        self.expr(&when.condition, indent)?,
                        self.expr(&when.result, indent)?
                    ));
                }
                if let Some(otherwise) = otherwise {
                    text.push_str(&format!(" ELSE {}", self.expr(otherwise, indent)?));
                }
                text.push_str(" END");
                Ok(text)
            }
            Expr::Function { name, args, .. } => Ok(format!("{name}({})", self.expr_list(args, indent)?)),
            Expr::Aggregate { func, arg, distinct } => {
                if *distinct && !self.dialect.allows_distinct_in_aggregates {
                    return Err(TranslateError::unsupported(format!(
                        "{} does not allow DISTINCT inside {}",
                        self.dialect.name,
                        aggregate_name(*func)
                    )));
                }
                let arg = match (arg, func) {
                    (Some(arg), _) => self.expr(arg, indent)?,
                    (None, AggregateFunc::Count) => "*".to_string(),
                    (None, func) => {
                        return Err(TranslateError::inconsistent(format!(
                            "{} without an argument",
                            aggregate_name(*func)
                        )))
                    }
                };
                let distinct = if *distinct { "DISTINCT " } else { "" };
                Ok(format!("{}({distinct}{arg})", aggregate_name(*func)))
            }
            Expr::RowNumber { order_by } => {
                if order_by.is_empty() {
                    Ok("ROW_NUMBER() OVER ()".to_string())
                } else {
                    Ok(format!("ROW_NUMBER() OVER (ORDER BY {})", self.order_terms(order_by, indent)?))
                }
            }
            Expr::ScalarSubquery { select } => self.subquery(select, indent),
            Expr::Exists { select } => Ok(format!("EXISTS {}", self.subquery(select, indent)?)),
            Expr::InSubquery { expr, select } => Ok(format!(
                "{} IN {}",
                self.operand(expr, ATOM, indent)?,
                self.subquery(select, indent)?
            )),
            Expr::GeneratedId { member } => {
                self.dialect.generated_id_expression(member)?;
                Err(TranslateError::unsupported(format!(
                    "{} has no text form for the generated identity of '{member}'",
                    self.dialect.name
                )))
            }
        }
    }
}

const ATOM: u8 = 10;

fn binary_precedence(op: BinOp) -> u8 {
    match op {
        BinOp::Or => 1,
        BinOp::And => 2,
        BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge | BinOp::Like => 3,
        BinOp::Add | BinOp::Sub => 4,
        BinOp::Mul | BinOp::Div | BinOp::Mod => 5,
    }
}

fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Binary { op, .. } => binary_precedence(*op),
        Expr::IsNull { .. } | Expr::InSubquery { .. } => 3,
        _ => ATOM,
    }
}

fn binary_symbol(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Mod => "%",
        BinOp::Eq => "=",
        BinOp::Ne => "<>",
        BinOp::Lt => "<",
        BinOp::Le => "<=",
        BinOp::Gt => ">",
        BinOp::Ge => ">=",
        BinOp::And => "AND",
        BinOp::Or => "OR",
        BinOp::Like => "LIKE",
    }
}

fn aggregate_name(func: AggregateFunc) -> &'static str {
    match func {
        AggregateFunc::Count => "COUNT",
        AggregateFunc::Sum => "SUM",
        AggregateFunc::Avg => "AVG",
        AggregateFunc::Min => "MIN",
        AggregateFunc::Max => "MAX",
    }
}

fn join_keyword(kind: JoinKind) -> &'static str {
    match kind {
        JoinKind::Inner => "JOIN",
        JoinKind::LeftOuter => "LEFT OUTER JOIN",
        JoinKind::RightOuter => "RIGHT OUTER JOIN",
        JoinKind::FullOuter => "FULL OUTER JOIN",
        JoinKind::Cross => "CROSS JOIN",
        JoinKind::LeftSemi => "LEFT SEMI JOIN",
    }
}

fn literal(value: &Value) -> Result<String> {
    match value {
        Value::Null => Ok("NULL".to_string()),
        Value::Bool(true) => Ok("TRUE".to_string()),
        Value::Bool(false) => Ok("FALSE".to_string()),
        Value::Int(n) => Ok(n.to_string()),
        Value::Float(f) if f.is_finite() => Ok(format!("{f:?}")),
        Value::Float(f) => Err(TranslateError::unsupported(format!("non-finite literal {f}"))),
        Value::String(s) => Ok(quote_string(s)),
    }
}

fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;
    use hql_ir::{DataType, Projection, Projector, When};
    use std::sync::Arc;

    fn render(select: Select) -> Result<String> {
        format(&order_query(select), &Dialect::HIVE)
    }

    fn render_expr(expr: &Expr) -> String {
        Formatter { dialect: &Dialect::HIVE }.expr(expr, 0).unwrap()
    }

    #[test]
    fn test_flat_select() {
        let select = orders_select("t1", "t0")
            .with_filter(Expr::binary(BinOp::Gt, Expr::column("t0", "Amount"), Expr::int(10)))
            .with_order_by(vec![OrderTerm::desc(Expr::column("t0", "Id"))]);

        assert_eq!(
            render(select).unwrap(),
            "SELECT t0.Id, t0.Amount\nFROM Orders t0\nWHERE t0.Amount > 10\nORDER BY t0.Id DESC"
        );
    }

    #[test]
    fn test_nested_subquery_indented() {
        let inner = orders_select("t1", "t0");
        let mut outer = passthrough("t2", &inner);
        outer.columns[1] = ColumnDeclaration::new(
            "Total",
            Expr::binary(BinOp::Mul, Expr::column("t1", "Amount"), Expr::int(2)),
            DataType::Double,
        );

        assert_eq!(
            render(outer).unwrap(),
            "SELECT t1.Id, t1.Amount * 2 AS Total\nFROM (\n  SELECT t0.Id, t0.Amount\n  FROM Orders t0\n) t1"
        );
    }

    #[test]
    fn test_distinct_group_and_limit() {
        let count = Expr::Aggregate {
            func: AggregateFunc::Count,
            arg: Some(Box::new(Expr::column("t0", "Id"))),
            distinct: true,
        };
        let select = Select::new(
            "t1",
            vec![
                ColumnDeclaration::new("Region", Expr::column("t0", "Region"), DataType::String),
                ColumnDeclaration::new("n", count, DataType::BigInt),
            ],
            Some(Source::table("Orders", "t0")),
        )
        .with_group_by(vec![Expr::column("t0", "Region")])
        .with_distinct(true)
        .with_take(5);

        assert_eq!(
            render(select).unwrap(),
            "SELECT DISTINCT t0.Region, COUNT(DISTINCT t0.Id) AS n\nFROM Orders t0\nGROUP BY t0.Region\nLIMIT 5"
        );
    }

    #[test]
    fn test_precedence_parentheses() {
        let sum = Expr::binary(BinOp::Add, Expr::column("t0", "a"), Expr::column("t0", "b"));
        assert_eq!(render_expr(&Expr::binary(BinOp::Mul, sum.clone(), Expr::int(3))), "(t0.a + t0.b) * 3");

        let diff = Expr::binary(BinOp::Sub, Expr::int(1), Expr::binary(BinOp::Sub, Expr::int(2), Expr::int(3)));
        assert_eq!(render_expr(&diff), "1 - (2 - 3)");

        let either = Expr::binary(
            BinOp::Or,
            Expr::binary(BinOp::Eq, Expr::column("t0", "a"), Expr::int(1)),
            Expr::binary(BinOp::Eq, Expr::column("t0", "b"), Expr::int(2)),
        );
        let both = Expr::and(either, Expr::IsNull { expr: Box::new(sum), negated: true });
        assert_eq!(render_expr(&both), "(t0.a = 1 OR t0.b = 2) AND (t0.a + t0.b) IS NOT NULL");
    }

    #[test]
    fn test_literals_and_functions() {
        assert_eq!(render_expr(&Expr::string("it's a\\b")), "'it\\'s a\\\\b'");
        assert_eq!(render_expr(&Expr::Literal { value: Value::Float(2.0) }), "2.0");
        assert_eq!(render_expr(&Expr::Literal { value: Value::Null }), "NULL");

        let case = Expr::Case {
            whens: vec![When { condition: Expr::Literal { value: Value::Bool(true) }, result: Expr::int(1) }],
            otherwise: Some(Box::new(Expr::int(0))),
        };
        assert_eq!(render_expr(&case), "CASE WHEN TRUE THEN 1 ELSE 0 END");

        let udf = Expr::udf("geo_hash", vec![Expr::column("t0", "lat"), Expr::column("t0", "lon")], "/udf/geo.jar");
        assert_eq!(render_expr(&udf), "geo_hash(t0.lat, t0.lon)");

        let cast = Expr::Cast { expr: Box::new(Expr::column("t0", "a")), data_type: DataType::Decimal { precision: 10, scale: 2 } };
        assert_eq!(render_expr(&cast), "CAST(t0.a AS DECIMAL(10,2))");
    }

    #[test]
    fn test_negation_never_emits_comment_marker() {
        let neg = |expr| Expr::Unary { op: UnOp::Neg, expr: Box::new(expr) };
        assert_eq!(render_expr(&neg(Expr::int(-5))), "-(-5)");
        assert_eq!(render_expr(&neg(neg(Expr::column("t0", "a")))), "-(-t0.a)");
        assert_eq!(render_expr(&neg(Expr::int(5))), "-5");

        let mut select = orders_select("t1", "t0");
        select.columns.push(ColumnDeclaration::new("Neg", neg(Expr::int(-5)), DataType::Int));
        let text = render(select).unwrap();
        assert!(!text.contains("--"), "{text}");
    }

    #[test]
    fn test_row_number() {
        let rn = Expr::RowNumber {
            order_by: vec![OrderTerm::asc(Expr::column("t2", "Id")), OrderTerm::desc(Expr::column("t2", "Amount"))],
        };
        assert_eq!(render_expr(&rn), "ROW_NUMBER() OVER (ORDER BY t2.Id, t2.Amount DESC)");
    }

    #[test]
    fn test_join_keywords() {
        let mut select = orders_select("t1", "t0");
        select.from = Some(Source::Join {
            kind: JoinKind::LeftSemi,
            left: Box::new(Source::table("Orders", "t0")),
            right: Box::new(Source::table("Customers", "t2")),
            on: Some(Expr::binary(BinOp::Eq, Expr::column("t0", "CustomerId"), Expr::column("t2", "Id"))),
        });
        let text = render(select).unwrap();
        assert!(text.contains("FROM Orders t0\nLEFT SEMI JOIN Customers t2 ON t0.CustomerId = t2.Id"), "{text}");
    }

    #[test]
    fn test_exists_subquery() {
        let lookup = orders_select("t3", "t4");
        let select = orders_select("t1", "t0").with_filter(Expr::Exists { select: Arc::new(lookup) });
        let text = render(select).unwrap();
        assert!(text.ends_with("WHERE EXISTS (\n  SELECT t4.Id, t4.Amount\n  FROM Orders t4\n)"), "{text}");
    }

    #[test]
    fn test_quoting_dialect() {
        let dialect = Dialect { quotes_identifiers: true, ..Dialect::HIVE };
        let text = format(&order_query(orders_select("t1", "t0")), &dialect).unwrap();
        assert!(text.starts_with("SELECT `t0`.`Id`, `t0`.`Amount`\nFROM `Orders` `t0`"), "{text}");
    }

    #[test]
    fn test_leftovers_rejected() {
        let err = render(orders_select("t1", "t0").with_skip(3)).unwrap_err();
        assert!(matches!(err, TranslateError::Unsupported(_)));

        let err = render(orders_select("t1", "t0").with_reverse(true)).unwrap_err();
        assert!(matches!(err, TranslateError::InternalConsistency(_)));

        // skip 0 needs no OFFSET
        assert!(render(orders_select("t1", "t0").with_skip(0)).is_ok());
    }

    #[test]
    fn test_generated_id_unsupported() {
        let mut select = orders_select("t1", "t0");
        select.columns[0].expr = Expr::GeneratedId { member: "Id".to_string() };
        let err = render(select).unwrap_err();
        assert!(matches!(err, TranslateError::Unsupported(_)));
    }

    #[test]
    fn test_strict_dialect_flags() {
        let strict = Dialect {
            allows_distinct_in_aggregates: false,
            allows_subquery_in_select_without_from: false,
            ..Dialect::HIVE
        };

        let mut select = orders_select("t1", "t0");
        select.columns[1].expr = Expr::Aggregate {
            func: AggregateFunc::Sum,
            arg: Some(Box::new(Expr::column("t0", "Amount"))),
            distinct: true,
        };
        assert!(format(&order_query(select), &strict).is_err());

        let constant = Select::new("t3", vec![ColumnDeclaration::new("one", Expr::int(1), DataType::Int)], None);
        let mut select = orders_select("t1", "t0");
        select.columns[1].expr = Expr::ScalarSubquery { select: Arc::new(constant) };
        let stmt = order_query(select);
        assert!(matches!(format(&stmt, &strict), Err(TranslateError::Unsupported(_))));
        assert!(format(&stmt, &Dialect::HIVE).unwrap().contains("(\n  SELECT 1 AS one\n) AS Amount"));
    }

    #[test]
    fn test_batches() {
        let one = order_query(orders_select("t1", "t0"));
        let batch = Statement::Batch { statements: vec![one.clone()] };
        assert_eq!(format(&batch, &Dialect::HIVE).unwrap(), format(&one, &Dialect::HIVE).unwrap());

        let batch = Statement::Batch { statements: vec![one.clone(), one.clone()] };
        assert!(matches!(format(&batch, &Dialect::HIVE), Err(TranslateError::Unsupported(_))));

        let multi = Dialect { allows_multiple_commands: true, ..Dialect::HIVE };
        assert!(format(&batch, &multi).unwrap().contains(";\n"));

        let empty = Statement::Batch { statements: vec![] };
        assert!(matches!(format(&empty, &Dialect::HIVE), Err(TranslateError::InternalConsistency(_))));
    }

    #[test]
    fn test_scalar_projection_formats_select() {
        let stmt = Statement::Query(Projection {
            select: Arc::new(orders_select("t1", "t0")),
            projector: Projector::Scalar { expr: Expr::column("t1", "Id") },
        });
        assert!(format(&stmt, &Dialect::HIVE).unwrap().starts_with("SELECT t0.Id"));
    }
}
