//! Translation of document-store queries into JSONB predicates.
//!
//! Field names and values are always bound, never spliced into the SQL text.

use rankboard_core::store::{Collection, Filter, FilterOp, FilterValue, Query};
use sqlx::{Postgres, QueryBuilder};

use crate::error::{ApiError, Result};

fn validate_field(field: &str) -> Result<()> {
    if field.is_empty() || !field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ApiError::InvalidQuery(format!("invalid filter field '{}'", field)));
    }
    Ok(())
}

fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &Filter) {
    let field = filter.field.clone();
    match (&filter.op, &filter.value) {
        (FilterOp::Eq, FilterValue::Text(value)) => {
            builder.push("body ->> ").push_bind(field).push(" = ").push_bind(value.clone());
        }
        (FilterOp::Gte, FilterValue::Text(value)) => {
            builder.push("body ->> ").push_bind(field).push(" >= ").push_bind(value.clone());
        }
        (FilterOp::Eq, FilterValue::Timestamp(ts)) => {
            builder.push("(body ->> ").push_bind(field).push(")::timestamptz = ").push_bind(*ts);
        }
        (FilterOp::Gte, FilterValue::Timestamp(ts)) => {
            builder.push("(body ->> ").push_bind(field).push(")::timestamptz >= ").push_bind(*ts);
        }
        (FilterOp::Contains, FilterValue::Text(value)) => {
            builder
                .push("body -> ")
                .push_bind(field)
                .push(" @> jsonb_build_array(")
                .push_bind(value.clone())
                .push("::text)");
        }
        (FilterOp::Contains, FilterValue::Timestamp(_)) => {
            builder.push("FALSE");
        }
    }
}

/// Build `SELECT body FROM documents WHERE ...` for a collection query.
pub fn build_select(
    collection: Collection,
    query: &Query,
) -> Result<QueryBuilder<'static, Postgres>> {
    for filter in &query.filters {
        validate_field(&filter.field)?;
    }

    let mut builder = QueryBuilder::new("SELECT body FROM documents WHERE collection = ");
    builder.push_bind(collection.as_str());
    for filter in &query.filters {
        builder.push(" AND ");
        push_filter(&mut builder, filter);
    }
    builder.push(" ORDER BY id");
    Ok(builder)
}
