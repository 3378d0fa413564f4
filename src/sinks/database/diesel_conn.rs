//! 基于 Diesel 的 `Connection` 实现
//!
//! Diesel 连接默认处于自动提交模式，这里保持这一模式：数据库 handler 每条记录只执行
//! 一条 INSERT，语句成功返回时记录已经持久化，`commit`/`rollback` 因此不需要做任何事。
//! 多个线程、多个 handler 共享同一个连接时，某个线程的失败不会影响其他线程已写入的记录。

use crate::sinks::database::connection::{Connection, Cursor, DbError, DbResult, ParamStyle, SqlValue};
use crate::sinks::database::schema::validate_table_name;
use diesel::result::{DatabaseErrorInformation, DatabaseErrorKind, Error as DieselError};
use diesel::sql_types::Text;
use diesel::QueryableByName;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

impl From<DieselError> for DbError {
    fn from(e: DieselError) -> Self {
        match e {
            DieselError::DatabaseError(kind, info) => match kind {
                DatabaseErrorKind::UniqueViolation
                | DatabaseErrorKind::ForeignKeyViolation
                | DatabaseErrorKind::NotNullViolation
                | DatabaseErrorKind::CheckViolation => DbError::Integrity(info.message().to_string()),
                DatabaseErrorKind::ClosedConnection => DbError::Connectivity(info.message().to_string()),
                _ => DbError::Backend(info.message().to_string()),
            },
            other => DbError::Backend(other.to_string()),
        }
    }
}

impl From<diesel::ConnectionError> for DbError {
    fn from(e: diesel::ConnectionError) -> Self {
        DbError::Connectivity(e.to_string())
    }
}

#[derive(QueryableByName)]
struct ColumnName {
    #[diesel(sql_type = Text)]
    name: String,
}

/// 用互斥锁包装的 Diesel 连接
///
/// 每条语句在锁内执行并由数据库自动提交，线程之间不共享事务状态。
pub struct DieselConnection<Conn> {
    conn: Mutex<Conn>,
}

impl<Conn> fmt::Debug for DieselConnection<Conn> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DieselConnection")
            .field("backend", &std::any::type_name::<Conn>())
            .finish()
    }
}

impl<Conn: diesel::Connection> DieselConnection<Conn> {
    /// 包装已经建立的连接
    pub fn new(conn: Conn) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// 按数据库 URL 建立连接
    pub fn establish(database_url: &str) -> DbResult<Self> {
        Ok(Self::new(Conn::establish(database_url)?))
    }

    /// 在锁内直接使用底层连接
    pub fn with_connection<R>(&self, f: impl FnOnce(&mut Conn) -> R) -> R {
        f(&mut *lock(&self.conn))
    }
}

fn lock<Conn>(conn: &Mutex<Conn>) -> MutexGuard<'_, Conn> {
    conn.lock().unwrap_or_else(PoisonError::into_inner)
}

fn checked_table(table: &str) -> DbResult<()> {
    validate_table_name(table).map_err(|e| DbError::Backend(e.to_string()))
}

struct DieselCursor<'a, Conn> {
    conn: &'a Mutex<Conn>,
}

macro_rules! impl_diesel_connection {
    ($conn:ty, $backend:ty, $style:expr, $columns:ident) => {
        impl Cursor for DieselCursor<'_, $conn> {
            fn execute(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<u64> {
                use diesel::sql_types::{BigInt, Double, Nullable, Timestamp};
                use diesel::RunQueryDsl;

                let mut conn = lock(self.conn);

                let mut query = diesel::sql_query(sql).into_boxed::<$backend>();
                for value in params {
                    query = match value {
                        // 整数型 NULL 可以赋值给文本列和整数列
                        SqlValue::Null => query.bind::<Nullable<BigInt>, _>(None::<i64>),
                        SqlValue::Integer(i) => query.bind::<BigInt, _>(*i),
                        SqlValue::Real(r) => query.bind::<Double, _>(*r),
                        SqlValue::Text(s) => query.bind::<Text, _>(s.clone()),
                        SqlValue::Timestamp(ts) => query.bind::<Timestamp, _>(*ts),
                    };
                }

                let rows = query.execute(&mut *conn)?;
                Ok(rows as u64)
            }
        }

        impl Connection for DieselConnection<$conn> {
            fn cursor(&self) -> DbResult<Box<dyn Cursor + '_>> {
                Ok(Box::new(DieselCursor { conn: &self.conn }))
            }

            // 语句已自动提交；执行失败的 INSERT 不留下任何数据，无需回滚
            fn commit(&self) -> DbResult<()> {
                Ok(())
            }

            fn rollback(&self) -> DbResult<()> {
                Ok(())
            }

            fn param_style(&self) -> ParamStyle {
                $style
            }

            fn table_columns(&self, table: &str) -> DbResult<Option<Vec<String>>> {
                checked_table(table)?;
                $columns(&mut *lock(&self.conn), table).map(Some)
            }
        }
    };
}

#[cfg(feature = "sqlite")]
fn sqlite_table_columns(conn: &mut diesel::sqlite::SqliteConnection, table: &str) -> DbResult<Vec<String>> {
    use diesel::RunQueryDsl;

    let sql = match table.split_once('.') {
        Some((schema, name)) => format!("PRAGMA {}.table_info({})", schema, name),
        None => format!("PRAGMA table_info({})", table),
    };
    let rows: Vec<ColumnName> = diesel::sql_query(sql).load(conn)?;
    Ok(rows.into_iter().map(|row| row.name).collect())
}

#[cfg(feature = "postgres")]
fn postgres_table_columns(conn: &mut diesel::pg::PgConnection, table: &str) -> DbResult<Vec<String>> {
    use diesel::RunQueryDsl;

    // 未加引号的标识符在 PostgreSQL 中按小写存储
    let rows: Vec<ColumnName> = match table.split_once('.') {
        Some((schema, name)) => diesel::sql_query(
            "SELECT column_name::text AS name FROM information_schema.columns \
             WHERE lower(table_schema) = lower($1) AND lower(table_name) = lower($2) \
             ORDER BY ordinal_position",
        )
        .bind::<Text, _>(schema)
        .bind::<Text, _>(name)
        .load(conn)?,
        None => diesel::sql_query(
            "SELECT column_name::text AS name FROM information_schema.columns \
             WHERE table_schema = current_schema() AND lower(table_name) = lower($1) \
             ORDER BY ordinal_position",
        )
        .bind::<Text, _>(table)
        .load(conn)?,
    };
    Ok(rows.into_iter().map(|row| row.name).collect())
}

#[cfg(feature = "mysql")]
fn mysql_table_columns(conn: &mut diesel::mysql::MysqlConnection, table: &str) -> DbResult<Vec<String>> {
    use diesel::RunQueryDsl;

    let rows: Vec<ColumnName> = match table.split_once('.') {
        Some((schema, name)) => diesel::sql_query(
            "SELECT CAST(column_name AS CHAR) AS name FROM information_schema.columns \
             WHERE table_schema = ? AND table_name = ? ORDER BY ordinal_position",
        )
        .bind::<Text, _>(schema)
        .bind::<Text, _>(name)
        .load(conn)?,
        None => diesel::sql_query(
            "SELECT CAST(column_name AS CHAR) AS name FROM information_schema.columns \
             WHERE table_schema = DATABASE() AND table_name = ? ORDER BY ordinal_position",
        )
        .bind::<Text, _>(table)
        .load(conn)?,
    };
    Ok(rows.into_iter().map(|row| row.name).collect())
}

#[cfg(feature = "sqlite")]
impl_diesel_connection!(
    diesel::sqlite::SqliteConnection,
    diesel::sqlite::Sqlite,
    ParamStyle::Qmark,
    sqlite_table_columns
);

#[cfg(feature = "postgres")]
impl_diesel_connection!(
    diesel::pg::PgConnection,
    diesel::pg::Pg,
    ParamStyle::Numeric,
    postgres_table_columns
);

#[cfg(feature = "mysql")]
impl_diesel_connection!(
    diesel::mysql::MysqlConnection,
    diesel::mysql::Mysql,
    ParamStyle::Qmark,
    mysql_table_columns
);

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::core::level::Level;
    use crate::core::record::LogRecord;
    use crate::sinks::database::handler::DatabaseHandler;
    use crate::sinks::database::schema::{make_log_table_definition, ColumnOverrides};
    use crate::sinks::traits::Handler;
    use diesel::connection::SimpleConnection;
    use diesel::sql_types::BigInt;
    use diesel::sqlite::SqliteConnection;
    use diesel::RunQueryDsl;
    use std::sync::Arc;
    use std::thread;

    #[derive(QueryableByName)]
    struct Count {
        #[diesel(sql_type = BigInt)]
        n: i64,
    }

    fn row_count(conn: &DieselConnection<SqliteConnection>) -> i64 {
        conn.with_connection(|c| diesel::sql_query("SELECT COUNT(*) AS n FROM logs").get_result::<Count>(c))
            .unwrap()
            .n
    }

    #[derive(QueryableByName)]
    struct Row {
        #[diesel(sql_type = Text)]
        logger: String,
        #[diesel(sql_type = diesel::sql_types::Nullable<Text>)]
        message: Option<String>,
        #[diesel(sql_type = diesel::sql_types::Integer)]
        level: i32,
    }

    fn memory_connection() -> Arc<DieselConnection<SqliteConnection>> {
        let conn = Arc::new(DieselConnection::<SqliteConnection>::establish(":memory:").unwrap());
        let ddl = make_log_table_definition("logs", "log_id", &ColumnOverrides::default()).unwrap();
        conn.with_connection(|c| c.batch_execute(&ddl)).unwrap();
        conn
    }

    #[test]
    fn test_sqlite_insert_and_commit() {
        let conn = memory_connection();
        let handler = DatabaseHandler::new(conn.clone(), "logs").unwrap();

        handler
            .emit(&LogRecord::new("app.db", Level::Warning, "disk low"))
            .unwrap();
        handler
            .emit(&LogRecord::new("app.db", Level::Error, ""))
            .unwrap();

        let rows: Vec<Row> = conn
            .with_connection(|c| {
                diesel::sql_query("SELECT logger, message, level FROM logs ORDER BY log_id").load(c)
            })
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].logger, "app.db");
        assert_eq!(rows[0].message.as_deref(), Some("disk low"));
        assert_eq!(rows[0].level, 30);
        assert_eq!(rows[1].message, None);
    }

    #[test]
    fn test_sqlite_failed_insert_rolls_back() {
        let conn = memory_connection();
        let handler = DatabaseHandler::new(conn.clone(), "missing_table").unwrap();

        assert!(handler
            .emit(&LogRecord::new("app", Level::Error, "lost"))
            .is_err());

        // 回滚后连接可以继续使用
        let ok = DatabaseHandler::new(conn, "logs").unwrap();
        assert!(ok.emit(&LogRecord::new("app", Level::Error, "kept")).is_ok());
    }

    #[test]
    fn test_failed_emit_keeps_earlier_rows() {
        let conn = memory_connection();
        let good = DatabaseHandler::new(conn.clone(), "logs").unwrap();
        let broken = DatabaseHandler::new(conn.clone(), "missing_table").unwrap();

        let params = good
            .record_values(&LogRecord::new("app", Level::Info, "written first"))
            .unwrap();
        conn.cursor()
            .unwrap()
            .execute(good.insert_sql(), &params)
            .unwrap();

        assert!(broken.emit(&LogRecord::new("app", Level::Error, "lost")).is_err());
        conn.commit().unwrap();

        assert_eq!(row_count(&conn), 1);
    }

    #[test]
    fn test_shared_connection_across_threads() {
        let conn = memory_connection();
        let good = Arc::new(DatabaseHandler::new(conn.clone(), "logs").unwrap());
        let broken = Arc::new(DatabaseHandler::new(conn.clone(), "missing_table").unwrap());

        let workers: Vec<_> = (0..8)
            .map(|worker| {
                let good = good.clone();
                let broken = broken.clone();
                thread::spawn(move || {
                    let mut written = 0i64;
                    for i in 0..25 {
                        let record = LogRecord::new("worker", Level::Info, format!("{}-{}", worker, i));
                        // 一半线程交替写入不存在的表
                        let handler = if worker % 2 == 1 && i % 3 == 0 { &broken } else { &good };
                        if handler.emit(&record).is_ok() {
                            written += 1;
                        }
                    }
                    written
                })
            })
            .collect();

        let written: i64 = workers.into_iter().map(|w| w.join().unwrap()).sum();
        // 4 个线程各有 9 条写入失败
        assert_eq!(written, 8 * 25 - 4 * 9);
        assert_eq!(row_count(&conn), written);
    }

    #[test]
    fn test_sqlite_table_columns() {
        let conn = memory_connection();
        let columns = conn.table_columns("logs").unwrap().unwrap();
        assert_eq!(columns[0], "log_id");
        assert!(columns.contains(&"level_name".to_string()));

        assert_eq!(conn.table_columns("nope").unwrap(), Some(vec![]));
        assert!(conn.table_columns("bad name").is_err());
    }
}
