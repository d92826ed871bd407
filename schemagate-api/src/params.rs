//! JSON parameter binding.
//!
//! Compiled statements carry their parameters as JSON values. The server
//! infers a type for every `$n` placeholder; [`SqlParam`] encodes the JSON
//! value as that type, so `"42.50"` binds to a NUMERIC column and `"2024-05-01"`
//! binds to a DATE column without casts in the SQL text.

use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use postgres_types::{to_sql_checked, IsNull, Kind, ToSql, Type};
use rust_decimal::Decimal;
use serde_json::Value;
use std::error::Error;
use std::str::FromStr;
use uuid::Uuid;

type BoxError = Box<dyn Error + Sync + Send>;

/// A JSON value bound as a statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlParam(pub Value);

impl SqlParam {
    pub fn all(values: &[Value]) -> Vec<SqlParam> {
        values.iter().cloned().map(SqlParam).collect()
    }
}

fn mismatch(value: &Value, ty: &Type) -> BoxError {
    format!("cannot bind {} as {}", value, ty.name()).into()
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn as_i64(value: &Value, ty: &Type) -> Result<i64, BoxError> {
    match value {
        Value::Number(n) => n.as_i64().ok_or_else(|| mismatch(value, ty)),
        Value::String(s) => s.trim().parse().map_err(|_| mismatch(value, ty)),
        _ => Err(mismatch(value, ty)),
    }
}

fn as_f64(value: &Value, ty: &Type) -> Result<f64, BoxError> {
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| mismatch(value, ty)),
        Value::String(s) => s.trim().parse().map_err(|_| mismatch(value, ty)),
        _ => Err(mismatch(value, ty)),
    }
}

fn as_decimal(value: &Value, ty: &Type) -> Result<Decimal, BoxError> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return Err(mismatch(value, ty)),
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| mismatch(value, ty))
}

fn as_str<'v>(value: &'v Value, ty: &Type) -> Result<&'v str, BoxError> {
    value.as_str().map(str::trim).ok_or_else(|| mismatch(value, ty))
}

fn parse_timestamptz(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|at| at.with_timezone(&Utc))
        .or_else(|| parse_timestamp(text).map(|naive| naive.and_utc()))
}

fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|at| at.naive_utc()))
        .or_else(|| parse_date(text).and_then(|date| date.and_hms_opt(0, 0, 0)))
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    let day = text.get(..10).unwrap_or(text);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

fn is_text_like(ty: &Type) -> bool {
    matches!(*ty, Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN)
        || ty.name() == "citext"
}

impl ToSql for SqlParam {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        let value = &self.0;
        if value.is_null() {
            return Ok(IsNull::Yes);
        }

        match *ty {
            Type::BOOL => match value {
                Value::Bool(b) => b.to_sql(ty, out),
                Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "t" | "yes" | "1" => true.to_sql(ty, out),
                    "false" | "f" | "no" | "0" => false.to_sql(ty, out),
                    _ => Err(mismatch(value, ty)),
                },
                _ => Err(mismatch(value, ty)),
            },
            Type::INT2 => i16::try_from(as_i64(value, ty)?)
                .map_err(|_| mismatch(value, ty))?
                .to_sql(ty, out),
            Type::INT4 => i32::try_from(as_i64(value, ty)?)
                .map_err(|_| mismatch(value, ty))?
                .to_sql(ty, out),
            Type::INT8 => as_i64(value, ty)?.to_sql(ty, out),
            Type::FLOAT4 => (as_f64(value, ty)? as f32).to_sql(ty, out),
            Type::FLOAT8 => as_f64(value, ty)?.to_sql(ty, out),
            Type::NUMERIC => as_decimal(value, ty)?.to_sql(ty, out),
            Type::JSON | Type::JSONB => value.to_sql(ty, out),
            Type::UUID => Uuid::parse_str(as_str(value, ty)?)
                .map_err(|_| mismatch(value, ty))?
                .to_sql(ty, out),
            Type::TIMESTAMPTZ => parse_timestamptz(as_str(value, ty)?)
                .ok_or_else(|| mismatch(value, ty))?
                .to_sql(ty, out),
            Type::TIMESTAMP => parse_timestamp(as_str(value, ty)?)
                .ok_or_else(|| mismatch(value, ty))?
                .to_sql(ty, out),
            Type::DATE => parse_date(as_str(value, ty)?)
                .ok_or_else(|| mismatch(value, ty))?
                .to_sql(ty, out),
            _ if is_text_like(ty) => as_text(value).as_str().to_sql(&Type::TEXT, out),
            _ => match ty.kind() {
                // Enum labels travel as their text in the binary protocol.
                Kind::Enum(labels) => {
                    let label = as_str(value, ty)?;
                    if !labels.is_empty() && !labels.iter().any(|l| l == label) {
                        return Err(format!("'{}' is not a value of enum {}", label, ty.name()).into());
                    }
                    out.extend_from_slice(label.as_bytes());
                    Ok(IsNull::No)
                }
                _ => Err(format!("unsupported parameter type {}", ty.name()).into()),
            },
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}
