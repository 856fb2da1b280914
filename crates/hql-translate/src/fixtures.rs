//! Shared trees for unit tests

use hql_ir::{
    ColumnDeclaration, DataType, EntityMapping, Expr, MemberBinding, Projection, Projector, Select, Source,
    Statement, StaticMapping,
};
use std::sync::Arc;

/// `SELECT t.Id, t.Amount FROM Orders t`
pub(crate) fn orders_select(alias: &str, table_alias: &str) -> Select {
    Select::new(
        alias,
        vec![
            ColumnDeclaration::new("Id", Expr::column(table_alias, "Id"), DataType::Int),
            ColumnDeclaration::new("Amount", Expr::column(table_alias, "Amount"), DataType::Double),
        ],
        Some(Source::table("Orders", table_alias)),
    )
}

/// Select over `inner` re-exposing each of its columns under the same name
pub(crate) fn passthrough(alias: &str, inner: &Select) -> Select {
    let columns = inner
        .columns
        .iter()
        .map(|c| ColumnDeclaration::new(c.name.clone(), inner.column_ref(&c.name), c.data_type.clone()))
        .collect();
    Select::new(alias, columns, Some(Source::subquery(inner.clone())))
}

/// `Order` entity materialized from the Id and Amount columns of `select`
pub(crate) fn order_query(select: Select) -> Statement {
    let members = ["Id", "Amount"]
        .iter()
        .map(|member| MemberBinding {
            member: member.to_string(),
            expr: select.column_ref(member),
        })
        .collect();
    Statement::Query(Projection {
        select: Arc::new(select),
        projector: Projector::Entity {
            entity: "Order".to_string(),
            members,
        },
    })
}

pub(crate) fn order_mapping() -> StaticMapping {
    StaticMapping::new().with_entity(
        EntityMapping::new("Order")
            .member("Id", DataType::Int)
            .member("Amount", DataType::Double),
    )
}

pub(crate) fn subquery_of(select: &Select) -> &Arc<Select> {
    match &select.from {
        Some(Source::Subquery { select }) => select,
        other => panic!("expected subquery source, got {other:?}"),
    }
}
