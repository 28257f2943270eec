use duckdb::Connection;
use r2d2::ManageConnection;

pub struct DuckDbConnectionManager {
    db_path: String,
}

impl DuckDbConnectionManager {
    pub fn new(db_path: String) -> Self {
        Self { db_path }
    }
}

impl ManageConnection for DuckDbConnectionManager {
    type Connection = Connection;
    type Error = duckdb::Error;

    fn connect(&self) -> Result<Self::Connection, Self::Error> {
        Connection::open(&self.db_path)
    }

    fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        conn.query_row("SELECT 1", [], |_| Ok(()))
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}
