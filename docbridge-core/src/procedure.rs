//! Host-callable procedure names.

use std::{fmt, str::FromStr};

use crate::envelope::ResultEnvelope;

/// One of the procedures a host registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Procedure {
    IsConnected,
    Insert,
    InsertOne,
    Find,
    FindOne,
    Update,
    UpdateOne,
    Count,
    Delete,
    DeleteOne,
}

impl Procedure {
    /// Every procedure, in registration order.
    pub const ALL: [Procedure; 10] = [
        Procedure::IsConnected,
        Procedure::Insert,
        Procedure::InsertOne,
        Procedure::Find,
        Procedure::FindOne,
        Procedure::Update,
        Procedure::UpdateOne,
        Procedure::Count,
        Procedure::Delete,
        Procedure::DeleteOne,
    ];

    /// The name the host registers the procedure under.
    pub fn name(&self) -> &'static str {
        match self {
            Procedure::IsConnected => "isConnected",
            Procedure::Insert => "insert",
            Procedure::InsertOne => "insertOne",
            Procedure::Find => "find",
            Procedure::FindOne => "findOne",
            Procedure::Update => "update",
            Procedure::UpdateOne => "updateOne",
            Procedure::Count => "count",
            Procedure::Delete => "delete",
            Procedure::DeleteOne => "deleteOne",
        }
    }

    /// Whether the procedure takes params and a callback.
    pub fn takes_callback(&self) -> bool {
        !matches!(self, Procedure::IsConnected)
    }
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a host asks for a procedure that does not exist.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown procedure: {0}")]
pub struct UnknownProcedure(pub String);

impl FromStr for Procedure {
    type Err = UnknownProcedure;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Procedure::ALL
            .into_iter()
            .find(|procedure| procedure.name() == name)
            .ok_or_else(|| UnknownProcedure(name.to_string()))
    }
}

/// Result of [`Dispatcher::call`](crate::dispatcher::Dispatcher::call).
#[derive(Debug, Clone, PartialEq)]
pub enum ProcedureOutput {
    /// Answer to `isConnected`.
    Connected(bool),
    /// Envelope of a CRUD procedure.
    Completed(ResultEnvelope),
}
