use std::ops::{Deref, DerefMut};

use sqlx::{
    sqlite::{SqliteConnection, SqlitePool},
    Sqlite, Transaction,
};

/// Unit of work for a single request.
///
/// Wraps a transaction on a pooled connection. Call [`Session::commit`] once
/// the request has succeeded; dropping the session instead rolls everything
/// back and hands the connection back to the pool.
pub struct Session(Transaction<'static, Sqlite>);

impl Session {
    /// Deferred transaction for requests that only read
    pub async fn begin(pool: &SqlitePool) -> Result<Self, sqlx::Error> {
        Ok(Self(pool.begin().await?))
    }

    /// Transaction that takes SQLite's write lock up front.
    ///
    /// A deferred transaction that reads and then writes cannot upgrade its
    /// lock while another writer holds one, and SQLite fails it at once
    /// instead of waiting. Taking the lock at `BEGIN` makes concurrent
    /// writers queue on the busy timeout.
    pub async fn begin_write(pool: &SqlitePool) -> Result<Self, sqlx::Error> {
        Ok(Self(pool.begin_with("BEGIN IMMEDIATE").await?))
    }

    pub async fn commit(self) -> Result<(), sqlx::Error> {
        self.0.commit().await
    }
}

impl Deref for Session {
    type Target = SqliteConnection;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Session {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}
