//! `aggregate`, `group_by`

use std::collections::BTreeMap;

use folio_core::model::schema::EntitySchema;
use folio_core::query::{
    AggregateArgs, AggregateOp, AggregateResult, CountAggregate, GroupByArgs, GroupOrder,
    GroupRow, Having, QueryMode, COUNT_ALL,
};
use rusqlite::types::Value as SqlValue;
use rusqlite::Row;

use super::read::{compile_window, Window};
use super::Session;
use crate::errors::{from_rusqlite, Result};
use crate::sql::value::{from_sql, number_from_sql, number_to_sql, to_sql};
use crate::sql::{col, conjoin, field, order_terms, quote, select_list, SqlWriter, ROOT};

fn aggregate_expr(schema: &EntitySchema, alias: &str, op: AggregateOp, name: &str) -> Result<String> {
    if name == COUNT_ALL {
        return Ok("COUNT(*)".to_string());
    }
    let column = col(alias, field(schema, name)?.column);
    let func = match op {
        AggregateOp::Count => "COUNT",
        AggregateOp::Avg => "AVG",
        AggregateOp::Sum => "SUM",
        AggregateOp::Min => "MIN",
        AggregateOp::Max => "MAX",
    };
    Ok(format!("{}({})", func, column))
}

/// Read the aggregate columns starting at `offset`, in `pairs` order
fn decode_aggregates(
    schema: &EntitySchema,
    pairs: &[(AggregateOp, &str)],
    row: &Row<'_>,
    offset: usize,
) -> Result<AggregateResult> {
    let mut result = AggregateResult::default();
    for (i, (op, name)) in pairs.iter().enumerate() {
        let raw = row.get_ref(offset + i).map_err(from_rusqlite)?;
        match op {
            AggregateOp::Count => {
                let n = number_from_sql(raw).as_i64().unwrap_or(0);
                let block = result.count.get_or_insert_with(CountAggregate::default);
                if *name == COUNT_ALL {
                    block.all = Some(n);
                } else {
                    block.fields.insert(name.to_string(), n);
                }
            }
            AggregateOp::Avg => {
                let avg = number_from_sql(raw).as_f64();
                result
                    .avg
                    .get_or_insert_with(BTreeMap::new)
                    .insert(name.to_string(), avg);
            }
            AggregateOp::Sum => {
                let sum = number_from_sql(raw).as_i64();
                result
                    .sum
                    .get_or_insert_with(BTreeMap::new)
                    .insert(name.to_string(), sum);
            }
            AggregateOp::Min | AggregateOp::Max => {
                let value = from_sql(field(schema, name)?, raw)?;
                let block = if *op == AggregateOp::Min {
                    &mut result.min
                } else {
                    &mut result.max
                };
                block
                    .get_or_insert_with(BTreeMap::new)
                    .insert(name.to_string(), value);
            }
        }
    }
    Ok(result)
}

/// Aggregates over the filtered, ordered and paginated window
pub fn aggregate(s: &Session<'_>, schema: &EntitySchema, args: &AggregateArgs) -> Result<AggregateResult> {
    let pairs = args.fields.pairs();
    if pairs.is_empty() {
        return Ok(AggregateResult::default());
    }

    let window = Window {
        filter: args.filter.as_ref(),
        order_by: &args.order_by,
        cursor: args.cursor.as_ref(),
        skip: args.skip,
        take: args.take,
        distinct: &[],
    };
    let columns = select_list(schema, ROOT);
    let (inner, params) = match compile_window(s, schema, &window, &columns)? {
        Some(query) => (query.sql, query.params),
        // Missing cursor row: aggregate over nothing
        None => (
            format!("SELECT {} FROM {} AS {} WHERE 0", columns, quote(schema.table), ROOT),
            Vec::new(),
        ),
    };

    let exprs = pairs
        .iter()
        .map(|(op, name)| aggregate_expr(schema, "s", *op, name))
        .collect::<Result<Vec<_>>>()?;
    let sql = format!("SELECT {} FROM ({}) AS s", exprs.join(", "), inner);

    let mut rows = s.query(&sql, &params, |row| decode_aggregates(schema, &pairs, row, 0))?;
    Ok(rows.pop().unwrap_or_default())
}

impl SqlWriter {
    fn having(&mut self, schema: &EntitySchema, having: &Having) -> Result<String> {
        match having {
            Having::Condition(cond) => match cond.aggregate {
                None => {
                    let def = field(schema, &cond.field)?;
                    self.condition(&col(ROOT, def.column), &cond.condition, QueryMode::Default, &|v| {
                        to_sql(def, v)
                    })
                }
                Some(op) => {
                    let expr = aggregate_expr(schema, ROOT, op, &cond.field)?;
                    match op {
                        AggregateOp::Min | AggregateOp::Max => {
                            let def = field(schema, &cond.field)?;
                            self.condition(&expr, &cond.condition, QueryMode::Default, &|v| {
                                to_sql(def, v)
                            })
                        }
                        _ => self.condition(&expr, &cond.condition, QueryMode::Default, &|v| {
                            Ok(number_to_sql(v))
                        }),
                    }
                }
            },
            Having::And(parts) => {
                let compiled = parts
                    .iter()
                    .map(|p| self.having(schema, p))
                    .collect::<Result<Vec<_>>>()?;
                Ok(conjoin(compiled, " AND ", "1"))
            }
            Having::Or(parts) => {
                let compiled = parts
                    .iter()
                    .map(|p| self.having(schema, p))
                    .collect::<Result<Vec<_>>>()?;
                Ok(conjoin(compiled, " OR ", "0"))
            }
            Having::Not(inner) => Ok(format!("NOT ({})", self.having(schema, inner)?)),
        }
    }
}

/// One row per distinct combination of the `by` fields
pub fn group_by(s: &Session<'_>, schema: &EntitySchema, args: &GroupByArgs) -> Result<Vec<GroupRow>> {
    let keys = args
        .by
        .iter()
        .map(|name| Ok(col(ROOT, field(schema, name)?.column)))
        .collect::<Result<Vec<_>>>()?;
    let pairs = args.fields.pairs();
    let mut columns = keys.clone();
    for (op, name) in &pairs {
        columns.push(aggregate_expr(schema, ROOT, *op, name)?);
    }

    let mut w = SqlWriter::new();
    let mut sql = format!(
        "SELECT {} FROM {} AS {}",
        columns.join(", "),
        quote(schema.table),
        ROOT
    );
    if let Some(filter) = &args.filter {
        sql.push_str(" WHERE ");
        sql.push_str(&w.filter(schema, ROOT, filter)?);
    }
    sql.push_str(" GROUP BY ");
    sql.push_str(&keys.join(", "));
    if let Some(having) = &args.having {
        sql.push_str(" HAVING ");
        sql.push_str(&w.having(schema, having)?);
    }
    if !args.order_by.is_empty() {
        let terms = args
            .order_by
            .iter()
            .map(|order| match order {
                GroupOrder::Field(o) => order_terms(schema, ROOT, std::slice::from_ref(o)),
                GroupOrder::Aggregate { op, field: name, direction } => Ok(format!(
                    "{} {}",
                    aggregate_expr(schema, ROOT, *op, name)?,
                    direction.sql()
                )),
            })
            .collect::<Result<Vec<_>>>()?;
        sql.push_str(" ORDER BY ");
        sql.push_str(&terms.join(", "));
    }
    if args.take.is_some() || args.skip.is_some() {
        let limit = args.take.map_or(-1, |t| i64::try_from(t).unwrap_or(i64::MAX));
        let offset = args.skip.map_or(0, |k| i64::try_from(k).unwrap_or(i64::MAX));
        sql.push_str(&format!(
            " LIMIT {} OFFSET {}",
            w.bind(SqlValue::Integer(limit)),
            w.bind(SqlValue::Integer(offset))
        ));
    }

    let by_fields = args
        .by
        .iter()
        .map(|name| field(schema, name))
        .collect::<Result<Vec<_>>>()?;
    s.query(&sql, w.params(), |row| {
        let mut keys = BTreeMap::new();
        for (i, def) in by_fields.iter().enumerate() {
            let raw = row.get_ref(i).map_err(from_rusqlite)?;
            keys.insert(def.name.to_string(), from_sql(def, raw)?);
        }
        let aggregates = decode_aggregates(schema, &pairs, row, by_fields.len())?;
        Ok(GroupRow { keys, aggregates })
    })
}
