//! Bring the top select back to the column layout the entity mapping expects
//!
//! Earlier passes add, rename and reorder columns. The reader that materializes
//! entities works from the mapping, so the outermost select must expose exactly
//! one column per mapped member, in mapping order, under the mapped column name.

use crate::error::{Result, TranslateError};
use hql_ir::visit;
use hql_ir::{
    ColumnDeclaration, DataType, EntityMapping, MappingProvider, MemberBinding, Projection, Projector, Select,
    Statement,
};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Re-shape the top select of every entity query to its mapping
///
/// Columns are matched by exact name. With `allow_positional_fallback` a member
/// with no column of its name takes the column at the member's position instead.
pub fn resynchronize(
    statement: &Statement,
    mapping: &dyn MappingProvider,
    allow_positional_fallback: bool,
) -> Result<Statement> {
    statement.try_map_queries(&mut |projection| resync_projection(projection, mapping, allow_positional_fallback))
}

fn resync_projection(
    projection: &Projection,
    mapping: &dyn MappingProvider,
    allow_positional_fallback: bool,
) -> Result<Projection> {
    let Projector::Entity { entity, .. } = &projection.projector else {
        return Ok(projection.clone());
    };
    let entity = mapping
        .entity(entity)
        .ok_or_else(|| TranslateError::UnknownEntity(entity.clone()))?;

    let select = &projection.select;
    let columns = expected_columns(select, entity, allow_positional_fallback)?;

    let mut rebuilt = Select::clone(select);
    rebuilt.columns = columns;
    let members = entity
        .members
        .iter()
        .map(|m| MemberBinding {
            member: m.member.clone(),
            expr: rebuilt.column_ref(&m.column),
        })
        .collect();

    debug!(entity = %entity.name, alias = %select.alias, "resynchronized top select with mapping");

    Ok(Projection {
        select: visit::share(select, rebuilt),
        projector: Projector::Entity {
            entity: entity.name.clone(),
            members,
        },
    })
}

fn expected_columns(
    select: &Select,
    entity: &EntityMapping,
    allow_positional_fallback: bool,
) -> Result<Vec<ColumnDeclaration>> {
    let mut seen = HashSet::new();
    let mut columns = Vec::with_capacity(entity.members.len());

    for (position, member) in entity.members.iter().enumerate() {
        if !seen.insert(member.column.as_str()) {
            return Err(TranslateError::inconsistent(format!(
                "entity '{}' maps column '{}' more than once",
                entity.name, member.column
            )));
        }

        let matched = match select.column(&member.column) {
            Some(column) => column,
            None if allow_positional_fallback => {
                let column = select.columns.get(position).ok_or_else(|| {
                    TranslateError::inconsistent(format!(
                        "select '{}' has no column for member '{}.{}'",
                        select.alias, entity.name, member.member
                    ))
                })?;
                warn!(
                    entity = %entity.name,
                    member = %member.member,
                    expected = %member.column,
                    matched = %column.name,
                    position,
                    "ambiguous column match, falling back to position"
                );
                column
            }
            None => {
                return Err(TranslateError::inconsistent(format!(
                    "select '{}' exposes no column '{}' for member '{}.{}'",
                    select.alias, member.column, entity.name, member.member
                )))
            }
        };

        let data_type = match matched.data_type {
            DataType::Unknown => member.data_type.clone(),
            ref known => known.clone(),
        };
        columns.push(ColumnDeclaration::new(member.column.clone(), matched.expr.clone(), data_type));
    }

    Ok(columns)
}
