//! DAO configuration.

use anydal_storage::IsolationLevel;

/// Configuration shared by every DAO.
#[derive(Debug, Clone)]
pub struct DaoConfig {
    /// Run the existence check and the insert of `create` inside one store
    /// transaction.
    pub transactional_create: bool,

    /// Isolation requested for DAO-initiated transactions.
    pub isolation: IsolationLevel,
}

impl Default for DaoConfig {
    fn default() -> Self {
        Self {
            transactional_create: true,
            isolation: IsolationLevel::Snapshot,
        }
    }
}

impl DaoConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether `create` runs inside a transaction.
    #[must_use]
    pub const fn transactional_create(mut self, value: bool) -> Self {
        self.transactional_create = value;
        self
    }

    /// Sets the transaction isolation level.
    #[must_use]
    pub const fn isolation(mut self, isolation: IsolationLevel) -> Self {
        self.isolation = isolation;
        self
    }
}
