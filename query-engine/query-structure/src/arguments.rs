use crate::{
    ComputedField, OrderBy, QueryStructureError, Result,
    filter::{Filter, json::json_kind},
};
use indexmap::IndexMap;
use query_value::QueryValue;
use serde_json::{Map, Value};

pub type DataRecord = IndexMap<String, DataValue>;

/// Builds a [`DataRecord`] from `(field, value)` pairs.
pub fn data_record<I, K, V>(entries: I) -> DataRecord
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<DataValue>,
{
    entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}

/// The arguments of a query. All of them are optional, which ones are required depends on the
/// action and is checked when compiling.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryArguments {
    pub filter: Option<Filter>,
    pub data: Option<WriteData>,
    pub order_by: Vec<OrderBy>,
    pub take: Option<i64>,
    pub skip: Option<i64>,
    pub select_fields: Vec<String>,
    pub aggregation: Option<AggregationSpec>,
    pub computed: IndexMap<String, ComputedField>,
    pub group_by_fields: Vec<String>,
    /// Upsert only: the row to insert when nothing matches.
    pub create: Option<DataRecord>,
    /// Upsert only: the assignments applied on conflict.
    pub update: Option<DataRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteData {
    Single(DataRecord),
    Many(Vec<DataRecord>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    Value(QueryValue),
    Relation(RelationWrite),
}

impl DataValue {
    pub fn as_value(&self) -> Option<&QueryValue> {
        match self {
            DataValue::Value(value) => Some(value),
            DataValue::Relation(_) => None,
        }
    }
}

macro_rules! data_value {
    ($($t:ty),* $(,)?) => {
        $(
            impl From<$t> for DataValue {
                fn from(value: $t) -> Self {
                    DataValue::Value(QueryValue::from(value))
                }
            }
        )*
    };
}

data_value!(
    QueryValue,
    &str,
    String,
    bool,
    i32,
    i64,
    u32,
    f64,
    chrono::DateTime<chrono::FixedOffset>,
    chrono::DateTime<chrono::Utc>,
    Vec<u8>,
    serde_json::Value,
);

impl From<RelationWrite> for DataValue {
    fn from(write: RelationWrite) -> Self {
        DataValue::Relation(write)
    }
}

/// Nested `connect`/`disconnect` instructions on a relation field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationWrite {
    pub connect: Vec<ConnectTarget>,
    pub disconnect: Vec<ConnectTarget>,
}

impl RelationWrite {
    pub fn connect(mut self, targets: impl IntoIterator<Item = ConnectTarget>) -> Self {
        self.connect.extend(targets);
        self
    }

    pub fn disconnect(mut self, targets: impl IntoIterator<Item = ConnectTarget>) -> Self {
        self.disconnect.extend(targets);
        self
    }
}

/// A related row picked by one unique field, usually `{ id: ... }`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectTarget {
    pub field: String,
    pub value: QueryValue,
}

impl ConnectTarget {
    pub fn id(value: impl Into<QueryValue>) -> Self {
        Self {
            field: "id".to_owned(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CountSelection {
    /// `COUNT(*)`
    pub all: bool,
    /// `COUNT(<field>)`, which skips nulls.
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CountFiltered {
    pub alias: String,
    pub filter: Filter,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregationSpec {
    pub count: Option<CountSelection>,
    pub avg: Vec<String>,
    pub sum: Vec<String>,
    pub min: Vec<String>,
    pub max: Vec<String>,
    pub count_filtered: Vec<CountFiltered>,
}

impl AggregationSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count_all(mut self) -> Self {
        self.count.get_or_insert_with(CountSelection::default).all = true;
        self
    }

    pub fn count(mut self, field: impl Into<String>) -> Self {
        self.count
            .get_or_insert_with(CountSelection::default)
            .fields
            .push(field.into());
        self
    }

    pub fn avg(mut self, field: impl Into<String>) -> Self {
        self.avg.push(field.into());
        self
    }

    pub fn sum(mut self, field: impl Into<String>) -> Self {
        self.sum.push(field.into());
        self
    }

    pub fn min(mut self, field: impl Into<String>) -> Self {
        self.min.push(field.into());
        self
    }

    pub fn max(mut self, field: impl Into<String>) -> Self {
        self.max.push(field.into());
        self
    }

    pub fn count_filtered(mut self, alias: impl Into<String>, filter: Filter) -> Self {
        self.count_filtered.push(CountFiltered {
            alias: alias.into(),
            filter,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.count.is_none()
            && self.avg.is_empty()
            && self.sum.is_empty()
            && self.min.is_empty()
            && self.max.is_empty()
            && self.count_filtered.is_empty()
    }

    /// Reads `{ _count, _avg, _sum, _min, _max, _countFiltered }`.
    pub fn from_json(value: Value) -> Result<Self> {
        let obj = match value {
            Value::Object(obj) => obj,
            other => {
                return Err(QueryStructureError::invalid_argument(
                    "aggregation",
                    format!("expected an object, found {}", json_kind(&other)),
                ));
            }
        };

        let mut spec = AggregationSpec::new();

        for (key, value) in obj {
            match key.as_str() {
                "_count" => spec.count = Some(parse_count(value)?),
                "_avg" => spec.avg = parse_field_list(&key, value)?,
                "_sum" => spec.sum = parse_field_list(&key, value)?,
                "_min" => spec.min = parse_field_list(&key, value)?,
                "_max" => spec.max = parse_field_list(&key, value)?,
                "_countFiltered" => spec.count_filtered = parse_count_filtered(value)?,
                other => {
                    return Err(QueryStructureError::invalid_argument(
                        "aggregation",
                        format!("unknown aggregate `{other}`"),
                    ));
                }
            }
        }

        Ok(spec)
    }
}

fn parse_count(value: Value) -> Result<CountSelection> {
    match value {
        Value::Bool(all) => Ok(CountSelection {
            all,
            fields: Vec::new(),
        }),
        Value::Object(obj) => {
            let mut count = CountSelection::default();

            for (field, flag) in obj {
                if flag != Value::Bool(true) {
                    continue;
                }

                if field == "_all" {
                    count.all = true;
                } else {
                    count.fields.push(field);
                }
            }

            Ok(count)
        }
        list @ Value::Array(_) => Ok(CountSelection {
            all: false,
            fields: parse_field_list("_count", list)?,
        }),
        other => Err(QueryStructureError::invalid_argument(
            "aggregation._count",
            format!("expected a boolean, a list or an object, found {}", json_kind(&other)),
        )),
    }
}

fn parse_field_list(key: &str, value: Value) -> Result<Vec<String>> {
    let invalid = |found: &Value| {
        QueryStructureError::invalid_argument(
            format!("aggregation.{key}"),
            format!("expected field names, found {}", json_kind(found)),
        )
    };

    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(field) => Ok(field),
                other => Err(invalid(&other)),
            })
            .collect(),
        Value::Object(obj) => Ok(obj
            .into_iter()
            .filter(|(_, flag)| *flag == Value::Bool(true))
            .map(|(field, _)| field)
            .collect()),
        other => Err(invalid(&other)),
    }
}

fn parse_count_filtered(value: Value) -> Result<Vec<CountFiltered>> {
    let argument = "aggregation._countFiltered";

    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| {
                let Value::Object(mut entry) = item else {
                    return Err(QueryStructureError::invalid_argument(argument, "expected `{ alias, where }`"));
                };

                let alias = match entry.remove("alias") {
                    Some(Value::String(alias)) => alias,
                    _ => return Err(QueryStructureError::invalid_argument(argument, "`alias` is required")),
                };

                let filter = Filter::from_json(entry.remove("where").unwrap_or(Value::Null))?;

                Ok(CountFiltered { alias, filter })
            })
            .collect(),
        Value::Object(obj) => obj
            .into_iter()
            .map(|(alias, filter)| {
                Ok(CountFiltered {
                    alias,
                    filter: Filter::from_json(filter)?,
                })
            })
            .collect(),
        other => Err(QueryStructureError::invalid_argument(
            argument,
            format!("expected a list or an object, found {}", json_kind(&other)),
        )),
    }
}

impl QueryArguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn data(mut self, data: DataRecord) -> Self {
        self.data = Some(WriteData::Single(data));
        self
    }

    pub fn data_many(mut self, data: Vec<DataRecord>) -> Self {
        self.data = Some(WriteData::Many(data));
        self
    }

    pub fn order_by(mut self, order_by: OrderBy) -> Self {
        self.order_by.push(order_by);
        self
    }

    pub fn take(mut self, take: i64) -> Self {
        self.take = Some(take);
        self
    }

    pub fn skip(mut self, skip: i64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn select_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn aggregation(mut self, aggregation: AggregationSpec) -> Self {
        self.aggregation = Some(aggregation);
        self
    }

    pub fn computed(mut self, alias: impl Into<String>, field: ComputedField) -> Self {
        self.computed.insert(alias.into(), field);
        self
    }

    pub fn group_by_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn create(mut self, create: DataRecord) -> Self {
        self.create = Some(create);
        self
    }

    pub fn update(mut self, update: DataRecord) -> Self {
        self.update = Some(update);
        self
    }

    /// Reads the `arguments` object of the JSON protocol.
    pub fn from_json(value: Value) -> Result<Self> {
        let obj = match value {
            Value::Null => return Ok(QueryArguments::default()),
            Value::Object(obj) => obj,
            other => {
                return Err(QueryStructureError::invalid_argument(
                    "arguments",
                    format!("expected an object, found {}", json_kind(&other)),
                ));
            }
        };

        let mut args = QueryArguments::default();

        for (key, value) in obj {
            match key.as_str() {
                "where" => args.filter = Some(Filter::from_json(value)?),
                "data" => args.data = Some(parse_write_data(value)?),
                "orderBy" => args.order_by = OrderBy::from_json(value)?,
                "take" => args.take = parse_count_argument(&key, value)?,
                "skip" => args.skip = parse_count_argument(&key, value)?,
                "selectFields" => args.select_fields = parse_string_list(&key, value)?,
                "groupByFields" | "by" => args.group_by_fields = parse_string_list(&key, value)?,
                "aggregation" => args.aggregation = Some(AggregationSpec::from_json(value)?),
                "computed" => {
                    let Value::Object(computed) = value else {
                        return Err(QueryStructureError::invalid_argument("computed", "expected an object"));
                    };

                    for (alias, field) in computed {
                        let field = ComputedField::from_json(&alias, field)?;
                        args.computed.insert(alias, field);
                    }
                }
                "create" => args.create = Some(parse_record(&key, value)?),
                "update" => args.update = Some(parse_record(&key, value)?),
                other => {
                    return Err(QueryStructureError::invalid_argument(other, "unknown argument"));
                }
            }
        }

        Ok(args)
    }
}

fn parse_count_argument(key: &str, value: Value) -> Result<Option<i64>> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => match n.as_i64() {
            Some(n) if n >= 0 => Ok(Some(n)),
            _ => Err(QueryStructureError::invalid_argument(
                key,
                format!("expected a non-negative integer, found {n}"),
            )),
        },
        other => Err(QueryStructureError::invalid_argument(
            key,
            format!("expected a non-negative integer, found {}", json_kind(&other)),
        )),
    }
}

fn parse_string_list(key: &str, value: Value) -> Result<Vec<String>> {
    match value {
        Value::String(single) => Ok(vec![single]),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => Ok(s),
                other => Err(QueryStructureError::invalid_argument(
                    key,
                    format!("expected field names, found {}", json_kind(&other)),
                )),
            })
            .collect(),
        other => Err(QueryStructureError::invalid_argument(
            key,
            format!("expected a list of field names, found {}", json_kind(&other)),
        )),
    }
}

fn parse_write_data(value: Value) -> Result<WriteData> {
    match value {
        Value::Array(rows) => rows
            .into_iter()
            .enumerate()
            .map(|(idx, row)| parse_record(&format!("data[{idx}]"), row))
            .collect::<Result<Vec<_>>>()
            .map(WriteData::Many),
        row => parse_record("data", row).map(WriteData::Single),
    }
}

fn parse_record(key: &str, value: Value) -> Result<DataRecord> {
    let obj = match value {
        Value::Object(obj) => obj,
        other => {
            return Err(QueryStructureError::invalid_argument(
                key,
                format!("expected an object, found {}", json_kind(&other)),
            ));
        }
    };

    obj.into_iter()
        .map(|(field, value)| {
            let value = match value {
                Value::Object(nested) if is_relation_write(&nested) => {
                    DataValue::Relation(parse_relation_write(&format!("{key}.{field}"), nested)?)
                }
                json @ Value::Object(_) => DataValue::Value(QueryValue::Json(json)),
                other => DataValue::Value(QueryValue::from(other)),
            };

            Ok((field, value))
        })
        .collect()
}

fn is_relation_write(obj: &Map<String, Value>) -> bool {
    !obj.is_empty() && obj.keys().all(|k| k == "connect" || k == "disconnect")
}

fn parse_relation_write(path: &str, mut obj: Map<String, Value>) -> Result<RelationWrite> {
    let connect = match obj.remove("connect") {
        Some(targets) => parse_connect_targets(&format!("{path}.connect"), targets)?,
        None => Vec::new(),
    };

    let disconnect = match obj.remove("disconnect") {
        Some(targets) => parse_connect_targets(&format!("{path}.disconnect"), targets)?,
        None => Vec::new(),
    };

    Ok(RelationWrite { connect, disconnect })
}

fn parse_connect_targets(path: &str, value: Value) -> Result<Vec<ConnectTarget>> {
    let targets = match value {
        Value::Array(items) => items,
        single => vec![single],
    };

    targets
        .into_iter()
        .map(|target| match target {
            Value::Object(obj) if obj.len() == 1 => {
                let (field, value) = obj
                    .into_iter()
                    .next()
                    .ok_or_else(|| QueryStructureError::invalid_argument(path, "empty target"))?;

                Ok(ConnectTarget {
                    field,
                    value: QueryValue::from(value),
                })
            }
            _ => Err(QueryStructureError::invalid_argument(
                path,
                "each target must be an object with exactly one unique field, e.g. `{ \"id\": 1 }`",
            )),
        })
        .collect()
}
