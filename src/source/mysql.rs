//! MySQL/MariaDB source connection
//!
//! Uses SQLx for the connection and async query execution. Column values
//! are decoded by their reported SQL type into [`SourceValue`]s.

use super::{SourceConfig, SourceConnection, SourceStore};
use crate::value::{Row, SourceValue};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use eyre::{Context, Result};
use owo_colors::OwoColorize;
use sqlx::mysql::types::MySqlTime;
use sqlx::mysql::{MySqlConnectOptions, MySqlRow, MySqlSslMode};
use sqlx::{Column, ConnectOptions, Connection, Row as _, TypeInfo, ValueRef};

/// MySQL source database
pub struct MySqlSource {
    config: SourceConfig,
}

impl MySqlSource {
    pub fn new(config: SourceConfig) -> Self {
        Self { config }
    }

    fn connect_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.config.host)
            .port(self.config.port)
            .username(&self.config.user)
            .password(&self.config.password)
            .database(&self.config.database)
            .ssl_mode(MySqlSslMode::Preferred)
    }
}

impl SourceStore for MySqlSource {
    type Connection = MySqlConnection;

    async fn open(&self) -> Result<MySqlConnection> {
        let conn = self.connect_options().connect().await.with_context(|| {
            format!(
                "Failed to connect to MySQL at {}:{}/{}",
                self.config.host, self.config.port, self.config.database
            )
        })?;

        log::info!(
            "Connected to MySQL database {}",
            format!(
                "{}:{}/{}",
                self.config.host, self.config.port, self.config.database
            )
            .bright_black()
        );

        Ok(MySqlConnection { conn })
    }
}

/// An open MySQL connection
pub struct MySqlConnection {
    conn: sqlx::MySqlConnection,
}

impl SourceConnection for MySqlConnection {
    async fn query(&mut self, sql: &str) -> Result<Vec<Row>> {
        let rows: Vec<MySqlRow> = sqlx::query(sql)
            .fetch_all(&mut self.conn)
            .await
            .with_context(|| format!("Query failed: {}", sql))?;

        rows.iter().map(decode_row).collect()
    }

    async fn close(self) -> Result<()> {
        self.conn
            .close()
            .await
            .with_context(|| "Failed to close MySQL connection")
    }
}

/// Decode every column of a row by its reported SQL type
fn decode_row(row: &MySqlRow) -> Result<Row> {
    row.columns()
        .iter()
        .map(|column| {
            let i = column.ordinal();
            let value = decode_value(row, i, column.type_info().name()).with_context(|| {
                format!(
                    "Failed to decode column '{}' ({})",
                    column.name(),
                    column.type_info().name()
                )
            })?;
            Ok((column.name().to_string(), value))
        })
        .collect()
}

/// How a column is decoded, keyed by the SQL type name sqlx reports
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ColumnKind {
    Null,
    Bool,
    Signed,
    Unsigned,
    Year,
    Float,
    Double,
    DateTime,
    Date,
    Time,
    Binary,
    Text,
}

impl ColumnKind {
    fn of(type_name: &str) -> Self {
        match type_name {
            "NULL" => Self::Null,
            "BOOLEAN" => Self::Bool,
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => Self::Signed,
            "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
            | "BIGINT UNSIGNED" => Self::Unsigned,
            "YEAR" | "YEAR UNSIGNED" => Self::Year,
            "FLOAT" => Self::Float,
            "DOUBLE" => Self::Double,
            "DATETIME" | "TIMESTAMP" => Self::DateTime,
            "DATE" => Self::Date,
            "TIME" => Self::Time,
            "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT"
            | "GEOMETRY" => Self::Binary,
            // DECIMAL, JSON, ENUM, SET and the text types arrive as text
            _ => Self::Text,
        }
    }
}

fn decode_value(row: &MySqlRow, i: usize, type_name: &str) -> Result<SourceValue> {
    if row.try_get_raw(i)?.is_null() {
        return Ok(SourceValue::Null);
    }

    let value = match ColumnKind::of(type_name) {
        ColumnKind::Null => SourceValue::Null,
        ColumnKind::Bool => SourceValue::Bool(row.try_get::<bool, _>(i)?),
        ColumnKind::Signed => SourceValue::Int(row.try_get::<i64, _>(i)?),
        ColumnKind::Unsigned => unsigned_value(row.try_get::<u64, _>(i)?),
        // sqlx has no Rust type registered for YEAR
        ColumnKind::Year => SourceValue::Int(row.try_get_unchecked::<u16, _>(i)?.into()),
        ColumnKind::Float => SourceValue::Float(widen_float(row.try_get::<f32, _>(i)?)),
        ColumnKind::Double => SourceValue::Float(row.try_get::<f64, _>(i)?),
        ColumnKind::DateTime => SourceValue::DateTime(row.try_get::<DateTime<Utc>, _>(i)?),
        ColumnKind::Date => SourceValue::DateTime(
            row.try_get::<NaiveDate, _>(i)?
                .and_time(NaiveTime::MIN)
                .and_utc(),
        ),
        // TIME is a signed duration of up to 838 hours, not a time of day
        ColumnKind::Time => SourceValue::String(row.try_get::<MySqlTime, _>(i)?.to_string()),
        ColumnKind::Binary => SourceValue::Bytes(row.try_get_unchecked::<Vec<u8>, _>(i)?),
        ColumnKind::Text => match row.try_get_unchecked::<String, _>(i) {
            Ok(text) => SourceValue::String(text),
            Err(_) => SourceValue::Bytes(row.try_get_unchecked::<Vec<u8>, _>(i)?),
        },
    };

    Ok(value)
}

/// Unsigned integers stay numbers unless they exceed the signed 64-bit range
fn unsigned_value(n: u64) -> SourceValue {
    match i64::try_from(n) {
        Ok(n) => SourceValue::Int(n),
        Err(_) => SourceValue::BigInt(n.into()),
    }
}

/// Widen a FLOAT through its shortest decimal form, so 14.074 stays 14.074
fn widen_float(x: f32) -> f64 {
    x.to_string().parse().unwrap_or(f64::from(x))
}
