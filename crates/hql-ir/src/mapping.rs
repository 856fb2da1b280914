//! Entity mapping metadata consumed from the object-relational binder

use crate::DataType;
use std::collections::HashMap;

/// One mapped member of an entity and the column it reads from
#[derive(Debug, Clone, PartialEq)]
pub struct MappedMember {
    pub member: String,
    pub column: String,
    pub data_type: DataType,
}

/// Expected shape of an entity: one column per mapped member, in declared order
#[derive(Debug, Clone, PartialEq)]
pub struct EntityMapping {
    pub name: String,
    pub members: Vec<MappedMember>,
}

impl EntityMapping {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
        }
    }

    /// Map `member` to a column of the same name
    pub fn member(self, member: impl Into<String>, data_type: DataType) -> Self {
        let member = member.into();
        let column = member.clone();
        self.member_as(member, column, data_type)
    }

    pub fn member_as(mut self, member: impl Into<String>, column: impl Into<String>, data_type: DataType) -> Self {
        self.members.push(MappedMember {
            member: member.into(),
            column: column.into(),
            data_type,
        });
        self
    }
}

/// Trait for resolving entity mappings at translation time
pub trait MappingProvider {
    /// Get the mapping of an entity by name
    fn entity(&self, name: &str) -> Option<&EntityMapping>;
}

/// In-memory mapping provider
#[derive(Debug, Default)]
pub struct StaticMapping {
    entities: HashMap<String, EntityMapping>,
}

impl StaticMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entity(&mut self, entity: EntityMapping) {
        self.entities.insert(entity.name.clone(), entity);
    }

    pub fn with_entity(mut self, entity: EntityMapping) -> Self {
        self.add_entity(entity);
        self
    }
}

impl MappingProvider for StaticMapping {
    fn entity(&self, name: &str) -> Option<&EntityMapping> {
        self.entities.get(name)
    }
}
