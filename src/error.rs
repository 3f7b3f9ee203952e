use thiserror::Error;

use crate::{fields::LogicalField, model::TableRole};

/// Fatal problems with the shape of an input table. Raised before any row is
/// computed; a run that hits one produces no summary at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("required column for {field} not found in the {table}")]
    MissingColumn { field: LogicalField, table: TableRole },

    #[error("no column for {field} found in either the sales ledger or the settlement table")]
    MissingInBoth { field: LogicalField },

    #[error("the {table} has no header row")]
    NoHeaders { table: TableRole },
}

impl SchemaError {
    pub fn field(&self) -> Option<LogicalField> {
        match self {
            SchemaError::MissingColumn { field, .. } | SchemaError::MissingInBoth { field } => {
                Some(*field)
            }
            SchemaError::NoHeaders { .. } => None,
        }
    }
}
