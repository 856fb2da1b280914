//! HiveQL relational IR
//!
//! Immutable query tree produced by the upstream object-relational binder and
//! consumed by the Hive translation passes. Every node is serializable so a tree
//! can be captured, fingerprinted and replayed.
//!
//! Subqueries are held behind [`Arc`] so that rewrites can share untouched
//! subtrees between their input and output trees.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;

mod mapping;
mod types;
pub mod visit;

pub use mapping::*;
pub use types::*;

/// Root of a compiled query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Statement {
    Query(Projection),
    /// Several top-level statements submitted together
    Batch { statements: Vec<Statement> },
}

impl Statement {
    /// Calculate fingerprint (SHA-256) for log correlation and caching
    pub fn fingerprint(&self) -> String {
        let json = serde_json::to_string(self).expect("IR should always serialize");
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Rebuild the statement by applying `f` to every query it contains
    pub fn try_map_queries<E>(
        &self,
        f: &mut impl FnMut(&Projection) -> Result<Projection, E>,
    ) -> Result<Statement, E> {
        match self {
            Statement::Query(projection) => Ok(Statement::Query(f(projection)?)),
            Statement::Batch { statements } => Ok(Statement::Batch {
                statements: statements
                    .iter()
                    .map(|s| s.try_map_queries(f))
                    .collect::<Result<_, _>>()?,
            }),
        }
    }

    /// All queries in statement order
    pub fn queries(&self) -> Vec<&Projection> {
        match self {
            Statement::Query(projection) => vec![projection],
            Statement::Batch { statements } => statements.iter().flat_map(|s| s.queries()).collect(),
        }
    }
}

/// A select paired with the projector that materializes one value per row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub select: Arc<Select>,
    pub projector: Projector,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Projector {
    /// Instance of a mapped entity, one binding per member
    Entity {
        entity: String,
        members: Vec<MemberBinding>,
    },
    Scalar {
        expr: Expr,
    },
}

impl Projector {
    /// Expressions read by the projector, in binding order
    pub fn exprs(&self) -> Vec<&Expr> {
        match self {
            Projector::Entity { members, .. } => members.iter().map(|m| &m.expr).collect(),
            Projector::Scalar { expr } => vec![expr],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberBinding {
    pub member: String,
    pub expr: Expr,
}

/// SELECT node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Select {
    pub alias: String,
    pub columns: Vec<ColumnDeclaration>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Source>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Expr>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<OrderTerm>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_by: Vec<Expr>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cluster_by: Vec<Expr>,

    #[serde(default)]
    pub distinct: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub take: Option<u64>,

    #[serde(default)]
    pub reverse: bool,
}

impl Select {
    pub fn new(alias: impl Into<String>, columns: Vec<ColumnDeclaration>, from: Option<Source>) -> Self {
        Self {
            alias: alias.into(),
            columns,
            from,
            filter: None,
            order_by: Vec::new(),
            group_by: Vec::new(),
            cluster_by: Vec::new(),
            distinct: false,
            skip: None,
            take: None,
            reverse: false,
        }
    }

    pub fn with_filter(mut self, filter: Expr) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_order_by(mut self, order_by: Vec<OrderTerm>) -> Self {
        self.order_by = order_by;
        self
    }

    pub fn with_group_by(mut self, group_by: Vec<Expr>) -> Self {
        self.group_by = group_by;
        self
    }

    pub fn with_distinct(mut self, distinct: bool) -> Self {
        self.distinct = distinct;
        self
    }

    pub fn with_skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn with_take(mut self, take: u64) -> Self {
        self.take = Some(take);
        self
    }

    pub fn with_reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    /// True when skip or take still has to be applied to this select
    pub fn has_paging(&self) -> bool {
        self.skip.is_some() || self.take.is_some()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDeclaration> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// First column whose source expression is structurally equal to `expr`
    pub fn column_for_expr(&self, expr: &Expr) -> Option<&ColumnDeclaration> {
        self.columns.iter().find(|c| c.expr == *expr)
    }

    /// Reference to one of this select's columns, as seen from an enclosing select
    pub fn column_ref(&self, name: &str) -> Expr {
        Expr::column(&self.alias, name)
    }

    pub fn has_aggregates(&self) -> bool {
        self.columns.iter().any(|c| c.expr.contains_aggregate())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDeclaration {
    pub name: String,
    pub expr: Expr,
    pub data_type: DataType,
}

impl ColumnDeclaration {
    pub fn new(name: impl Into<String>, expr: Expr, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            expr,
            data_type,
        }
    }
}

/// FROM clause source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Source {
    Table {
        name: String,
        alias: String,
    },
    Subquery {
        select: Arc<Select>,
    },
    Join {
        kind: JoinKind,
        left: Box<Source>,
        right: Box<Source>,
        #[serde(skip_serializing_if = "Option::is_none")]
        on: Option<Expr>,
    },
}

impl Source {
    pub fn table(name: impl Into<String>, alias: impl Into<String>) -> Self {
        Source::Table {
            name: name.into(),
            alias: alias.into(),
        }
    }

    pub fn subquery(select: Select) -> Self {
        Source::Subquery {
            select: Arc::new(select),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinKind {
    Inner,
    LeftOuter,
    RightOuter,
    FullOuter,
    Cross,
    LeftSemi,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderTerm {
    pub expr: Expr,
    #[serde(default)]
    pub direction: OrderDirection,
}

impl OrderTerm {
    pub fn asc(expr: Expr) -> Self {
        Self {
            expr,
            direction: OrderDirection::Ascending,
        }
    }

    pub fn desc(expr: Expr) -> Self {
        Self {
            expr,
            direction: OrderDirection::Descending,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderDirection {
    #[default]
    Ascending,
    Descending,
}

impl OrderDirection {
    pub fn reversed(self) -> Self {
        match self {
            OrderDirection::Ascending => OrderDirection::Descending,
            OrderDirection::Descending => OrderDirection::Ascending,
        }
    }
}

/// Expression types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Expr {
    /// Column `name` exposed by the table or select aliased `alias`
    Column { alias: String, name: String },
    Literal { value: Value },
    Binary { op: BinOp, left: Box<Expr>, right: Box<Expr> },
    Unary { op: UnOp, expr: Box<Expr> },
    IsNull { expr: Box<Expr>, negated: bool },
    Cast { expr: Box<Expr>, data_type: DataType },
    Case { whens: Vec<When>, otherwise: Option<Box<Expr>> },
    /// Scalar function call; user-defined functions carry the resource file
    /// that has to be staged before the query runs
    Function {
        name: String,
        args: Vec<Expr>,
        #[serde(skip_serializing_if = "Option::is_none")]
        resource: Option<String>,
    },
    Aggregate {
        func: AggregateFunc,
        arg: Option<Box<Expr>>,
        #[serde(default)]
        distinct: bool,
    },
    RowNumber { order_by: Vec<OrderTerm> },
    ScalarSubquery { select: Arc<Select> },
    Exists { select: Arc<Select> },
    InSubquery { expr: Box<Expr>, select: Arc<Select> },
    /// Store-generated identity value for an entity member
    GeneratedId { member: String },
}

impl Expr {
    pub fn column(alias: impl Into<String>, name: impl Into<String>) -> Self {
        Expr::Column {
            alias: alias.into(),
            name: name.into(),
        }
    }

    pub fn int(value: i64) -> Self {
        Expr::Literal {
            value: Value::Int(value),
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expr::Literal {
            value: Value::String(value.into()),
        }
    }

    pub fn binary(op: BinOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn and(left: Expr, right: Expr) -> Self {
        Expr::binary(BinOp::And, left, right)
    }

    pub fn udf(name: impl Into<String>, args: Vec<Expr>, resource: impl Into<String>) -> Self {
        Expr::Function {
            name: name.into(),
            args,
            resource: Some(resource.into()),
        }
    }

    /// Aggregate call at this level; aggregates inside subqueries belong to them
    pub fn contains_aggregate(&self) -> bool {
        match self {
            Expr::Aggregate { .. } => true,
            Expr::Column { .. }
            | Expr::Literal { .. }
            | Expr::GeneratedId { .. }
            | Expr::ScalarSubquery { .. }
            | Expr::Exists { .. }
            | Expr::RowNumber { .. } => false,
            Expr::Binary { left, right, .. } => left.contains_aggregate() || right.contains_aggregate(),
            Expr::Unary { expr, .. }
            | Expr::IsNull { expr, .. }
            | Expr::Cast { expr, .. }
            | Expr::InSubquery { expr, .. } => expr.contains_aggregate(),
            Expr::Case { whens, otherwise } => {
                whens
                    .iter()
                    .any(|w| w.condition.contains_aggregate() || w.result.contains_aggregate())
                    || otherwise.as_ref().is_some_and(|e| e.contains_aggregate())
            }
            Expr::Function { args, .. } => args.iter().any(Expr::contains_aggregate),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct When {
    pub condition: Expr,
    pub result: Expr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregateFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    // Arithmetic
    Add, Sub, Mul, Div, Mod,
    // Comparison
    Eq, Ne, Lt, Le, Gt, Ge,
    // Logical
    And, Or,
    // String
    Like,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orders_query() -> Statement {
        let select = Select::new(
            "t1",
            vec![
                ColumnDeclaration::new("Id", Expr::column("t0", "Id"), DataType::Int),
                ColumnDeclaration::new("Amount", Expr::column("t0", "Amount"), DataType::Double),
            ],
            Some(Source::table("Orders", "t0")),
        )
        .with_filter(Expr::binary(BinOp::Gt, Expr::column("t0", "Amount"), Expr::int(10)))
        .with_order_by(vec![OrderTerm::desc(Expr::column("t0", "Id"))])
        .with_take(5);

        Statement::Query(Projection {
            select: Arc::new(select),
            projector: Projector::Entity {
                entity: "Order".to_string(),
                members: vec![
                    MemberBinding { member: "Id".to_string(), expr: Expr::column("t1", "Id") },
                    MemberBinding { member: "Amount".to_string(), expr: Expr::column("t1", "Amount") },
                ],
            },
        })
    }

    #[test]
    fn test_fingerprint_deterministic() {
        let stmt1 = orders_query();
        let stmt2 = stmt1.clone();

        assert_eq!(stmt1.fingerprint(), stmt2.fingerprint());
    }

    #[test]
    fn test_fingerprint_changes_with_paging() {
        let stmt = orders_query();
        let changed = stmt
            .try_map_queries(&mut |p| {
                let mut select = (*p.select).clone();
                select.take = Some(6);
                Ok::<_, ()>(Projection { select: Arc::new(select), projector: p.projector.clone() })
            })
            .unwrap();

        assert_ne!(stmt.fingerprint(), changed.fingerprint());
    }

    #[test]
    fn test_json_round_trip() {
        let stmt = orders_query();

        let json = serde_json::to_string(&stmt).unwrap();
        let parsed: Statement = serde_json::from_str(&json).unwrap();

        assert_eq!(stmt, parsed);
        assert_eq!(stmt.fingerprint(), parsed.fingerprint());
    }

    #[test]
    fn test_contains_aggregate_stops_at_subqueries() {
        let count = Expr::Aggregate { func: AggregateFunc::Count, arg: None, distinct: false };
        assert!(Expr::binary(BinOp::Add, count.clone(), Expr::int(1)).contains_aggregate());

        let inner = Select::new("t9", vec![ColumnDeclaration::new("c", count, DataType::BigInt)], None);
        let scalar = Expr::ScalarSubquery { select: Arc::new(inner) };
        assert!(!scalar.contains_aggregate());
    }

    #[test]
    fn test_batch_queries_in_order() {
        let batch = Statement::Batch { statements: vec![orders_query(), orders_query()] };
        assert_eq!(batch.queries().len(), 2);
    }
}
