use chrono::NaiveDate;
use serde::Serialize;

/// BigQuery standard SQL parameter types used by the services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Int64,
    Float64,
    Bool,
    Date,
    Timestamp,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "STRING",
            ParamType::Int64 => "INT64",
            ParamType::Float64 => "FLOAT64",
            ParamType::Bool => "BOOL",
            ParamType::Date => "DATE",
            ParamType::Timestamp => "TIMESTAMP",
        }
    }
}

/// Parameter values travel as strings on the wire, whatever their type.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Scalar(Option<String>),
    Array(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryParameter {
    pub name: String,
    pub kind: ParamType,
    pub value: ParamValue,
}

/// A SQL statement with named (`@name`) parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub sql: String,
    pub params: Vec<QueryParameter>,
}

impl Query {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn bind(mut self, name: &str, kind: ParamType, value: ParamValue) -> Self {
        self.params.push(QueryParameter {
            name: name.to_string(),
            kind,
            value,
        });
        self
    }

    pub fn string(self, name: &str, value: impl Into<String>) -> Self {
        self.bind(name, ParamType::String, ParamValue::Scalar(Some(value.into())))
    }

    pub fn int(self, name: &str, value: i64) -> Self {
        self.bind(name, ParamType::Int64, ParamValue::Scalar(Some(value.to_string())))
    }

    pub fn date(self, name: &str, value: NaiveDate) -> Self {
        self.bind(
            name,
            ParamType::Date,
            ParamValue::Scalar(Some(value.format("%Y-%m-%d").to_string())),
        )
    }

    pub fn string_array<I, S>(self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.bind(name, ParamType::String, ParamValue::Array(values))
    }

    /// Value bound to `name`, for assertions and logging.
    pub fn param(&self, name: &str) -> Option<&ParamValue> {
        self.params
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }
}

/// `WHERE` clauses joined with `AND`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Conditions(Vec<String>);

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, clause: impl Into<String>) -> &mut Self {
        self.0.push(clause.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Rendered `WHERE ...` clause, or the empty string when there are no conditions.
    pub fn to_sql(&self) -> String {
        if self.0.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.0.join(" AND "))
        }
    }
}

impl<S: Into<String>> FromIterator<S> for Conditions {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}
