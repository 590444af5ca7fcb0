use crate::{AdapterError, AdapterFlavour, Queryable, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// An open transaction. Statements sent through it run inside the transaction until `commit` or
/// `rollback` closes it; after that every call fails with [`AdapterError::TransactionClosed`].
#[async_trait]
pub trait Transaction: Queryable {
    /// Commit the changes to the database and close the transaction.
    async fn commit(&self) -> Result<()>;

    /// Rolls back the changes to the database.
    async fn rollback(&self) -> Result<()>;

    fn is_active(&self) -> bool;

    fn as_queryable(&self) -> &dyn Queryable;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Snapshot,
    Serializable,
}

impl IsolationLevel {
    /// Snapshot isolation is not available through `SET TRANSACTION`, and SQLite transactions
    /// are always serializable.
    pub fn check_supported(self, flavour: AdapterFlavour) -> Result<()> {
        let supported = match (self, flavour) {
            (Self::Snapshot, _) => false,
            (level, AdapterFlavour::Sqlite) => level == Self::Serializable,
            _ => true,
        };

        if supported {
            Ok(())
        } else {
            Err(AdapterError::Generic {
                message: format!("Invalid isolation level `{self}` for {}", flavour.dialect_name()),
            })
        }
    }

    /// The statement setting this level, or `None` where the database has no such statement.
    pub fn set_statement(self, flavour: AdapterFlavour) -> Option<String> {
        match flavour {
            AdapterFlavour::Sqlite => None,
            AdapterFlavour::Mysql | AdapterFlavour::Postgres => Some(format!("SET TRANSACTION ISOLATION LEVEL {self}")),
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadUncommitted => write!(f, "READ UNCOMMITTED"),
            Self::ReadCommitted => write!(f, "READ COMMITTED"),
            Self::RepeatableRead => write!(f, "REPEATABLE READ"),
            Self::Snapshot => write!(f, "SNAPSHOT"),
            Self::Serializable => write!(f, "SERIALIZABLE"),
        }
    }
}

impl FromStr for IsolationLevel {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "read uncommitted" | "readuncommitted" => Ok(Self::ReadUncommitted),
            "read committed" | "readcommitted" => Ok(Self::ReadCommitted),
            "repeatable read" | "repeatableread" => Ok(Self::RepeatableRead),
            "snapshot" => Ok(Self::Snapshot),
            "serializable" => Ok(Self::Serializable),
            _ => Err(AdapterError::Conversion {
                message: format!("Invalid isolation level `{s}`"),
            }),
        }
    }
}
