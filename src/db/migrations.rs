use anyhow::{bail, Context, Result};
use rusqlite::Connection;

/// Schema scripts in order; `user_version` counts how many have been applied.
const MIGRATIONS: &[&str] = &[include_str!("schemas/schema_v1.sql")];

fn schema_version(conn: &Connection) -> Result<usize> {
    let raw: i64 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .context("failed to read user_version")?;
    usize::try_from(raw).with_context(|| format!("invalid user_version {raw}"))
}

/// Brings the schema up to the newest version in one transaction.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    let applied = schema_version(conn)?;
    let latest = MIGRATIONS.len();
    if applied > latest {
        bail!("database schema v{applied} is newer than this build understands (v{latest})");
    }
    if applied == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for (index, script) in MIGRATIONS.iter().enumerate().skip(applied) {
        tx.execute_batch(script)
            .with_context(|| format!("schema v{} failed", index + 1))?;
    }
    tx.pragma_update(None, "user_version", latest as i64)?;
    tx.commit().context("failed to commit schema upgrade")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_version(conn: &Connection) -> usize {
        schema_version(conn).unwrap()
    }

    #[test]
    fn creates_readings_table_and_sets_version() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        assert_eq!(user_version(&conn), MIGRATIONS.len());
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM sensor_values", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn adopts_table_left_by_legacy_logger() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE sensor_values (rDatetime datetime, sensorID text, temperature numeric, humidity numeric);
             INSERT INTO sensor_values VALUES ('2015-03-04 10:00:00', '1', 21.5, 40.1);",
        )
        .unwrap();

        migrate(&mut conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM sensor_values", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn rerunning_is_a_no_op() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();
        assert_eq!(user_version(&conn), MIGRATIONS.len());
    }

    #[test]
    fn refuses_newer_schema() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", MIGRATIONS.len() as i64 + 1)
            .unwrap();
        assert!(migrate(&mut conn).is_err());
    }

    #[test]
    fn refuses_negative_version() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", -1).unwrap();
        assert!(migrate(&mut conn).is_err());
    }
}
