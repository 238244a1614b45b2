//! Scoped transaction guard.

use crate::error::Result;

use super::facade::Db;

/// An open transaction. Dropping the guard without calling [`commit`]
/// or [`rollback`] rolls the transaction back on a background task and
/// releases the held connection.
///
/// [`commit`]: Transaction::commit
/// [`rollback`]: Transaction::rollback
pub struct Transaction {
    db: Db,
    resolved: bool,
}

impl Transaction {
    pub(crate) fn new(db: Db) -> Self {
        Self { db, resolved: false }
    }

    /// Make all changes since `begin` permanent.
    pub async fn commit(mut self) -> Result<()> {
        self.resolved = true;
        self.db.finish("COMMIT").await
    }

    /// Discard all changes since `begin`.
    pub async fn rollback(mut self) -> Result<()> {
        self.resolved = true;
        self.db.finish("ROLLBACK").await
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.resolved {
            let db = self.db.clone();
            tokio::spawn(async move {
                let _ = db.finish("ROLLBACK").await;
            });
        }
    }
}
