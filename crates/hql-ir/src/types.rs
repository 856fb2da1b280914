//! Hive column types

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    // Primitives
    Boolean,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Float,
    Double,
    Decimal { precision: u8, scale: u8 },

    // Text
    String,
    Varchar(u32),
    Char(u32),

    // Binary
    Binary,

    // Temporal
    Date,
    Timestamp,

    // Complex
    Array(Box<DataType>),
    Map { key: Box<DataType>, value: Box<DataType> },
    Struct(Vec<FieldType>),

    // Not known to the binder (e.g. columns synthesized by rewrites)
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldType {
    pub name: String,
    pub data_type: DataType,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Boolean => write!(f, "BOOLEAN"),
            DataType::TinyInt => write!(f, "TINYINT"),
            DataType::SmallInt => write!(f, "SMALLINT"),
            DataType::Int => write!(f, "INT"),
            DataType::BigInt => write!(f, "BIGINT"),
            DataType::Float => write!(f, "FLOAT"),
            DataType::Double => write!(f, "DOUBLE"),
            DataType::Decimal { precision, scale } => write!(f, "DECIMAL({precision},{scale})"),
            DataType::String => write!(f, "STRING"),
            DataType::Varchar(len) => write!(f, "VARCHAR({len})"),
            DataType::Char(len) => write!(f, "CHAR({len})"),
            DataType::Binary => write!(f, "BINARY"),
            DataType::Date => write!(f, "DATE"),
            DataType::Timestamp => write!(f, "TIMESTAMP"),
            DataType::Array(element) => write!(f, "ARRAY<{element}>"),
            DataType::Map { key, value } => write!(f, "MAP<{key},{value}>"),
            DataType::Struct(fields) => {
                write!(f, "STRUCT<")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}:{}", field.name, field.data_type)?;
                }
                write!(f, ">")
            }
            // Hive has no unknown type; STRING is what an untyped value reads back as
            DataType::Unknown => write!(f, "STRING"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complex_type_names() {
        let ty = DataType::Map {
            key: Box::new(DataType::String),
            value: Box::new(DataType::Array(Box::new(DataType::Decimal { precision: 10, scale: 2 }))),
        };
        assert_eq!(ty.to_string(), "MAP<STRING,ARRAY<DECIMAL(10,2)>>");

        let ty = DataType::Struct(vec![
            FieldType { name: "city".to_string(), data_type: DataType::Varchar(64) },
            FieldType { name: "zip".to_string(), data_type: DataType::Int },
        ]);
        assert_eq!(ty.to_string(), "STRUCT<city:VARCHAR(64),zip:INT>");
    }
}
