//! Lightweight SQL classification for span attributes.

use once_cell::sync::Lazy;
use regex::Regex;

/// Leading keyword of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlOperation {
    Select,
    Insert,
    Update,
    Delete,
    Create,
    Drop,
    Alter,
    Truncate,
    Begin,
    Commit,
    Rollback,
    Set,
    Other,
}

impl SqlOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            SqlOperation::Select => "SELECT",
            SqlOperation::Insert => "INSERT",
            SqlOperation::Update => "UPDATE",
            SqlOperation::Delete => "DELETE",
            SqlOperation::Create => "CREATE",
            SqlOperation::Drop => "DROP",
            SqlOperation::Alter => "ALTER",
            SqlOperation::Truncate => "TRUNCATE",
            SqlOperation::Begin => "BEGIN",
            SqlOperation::Commit => "COMMIT",
            SqlOperation::Rollback => "ROLLBACK",
            SqlOperation::Set => "SET",
            SqlOperation::Other => "QUERY",
        }
    }

    fn table_pattern(&self) -> Option<&'static Regex> {
        let re = match self {
            SqlOperation::Select => &SELECT_TABLE,
            SqlOperation::Insert => &INSERT_TABLE,
            SqlOperation::Update => &UPDATE_TABLE,
            SqlOperation::Delete => &DELETE_TABLE,
            SqlOperation::Create => &CREATE_TABLE,
            SqlOperation::Drop => &DROP_TABLE,
            SqlOperation::Alter => &ALTER_TABLE,
            SqlOperation::Truncate => &TRUNCATE_TABLE,
            _ => return None,
        };
        Some(Lazy::force(re))
    }
}

impl std::fmt::Display for SqlOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const KEYWORDS: &[(&str, SqlOperation)] = &[
    ("SELECT", SqlOperation::Select),
    ("WITH", SqlOperation::Select),
    ("INSERT", SqlOperation::Insert),
    ("UPDATE", SqlOperation::Update),
    ("DELETE", SqlOperation::Delete),
    ("CREATE", SqlOperation::Create),
    ("DROP", SqlOperation::Drop),
    ("ALTER", SqlOperation::Alter),
    ("TRUNCATE", SqlOperation::Truncate),
    ("BEGIN", SqlOperation::Begin),
    ("START", SqlOperation::Begin),
    ("COMMIT", SqlOperation::Commit),
    ("ROLLBACK", SqlOperation::Rollback),
    ("SET", SqlOperation::Set),
];

// Quoted identifiers: `name`, "name" or [name].
macro_rules! table_regex {
    ($prefix:literal) => {
        Lazy::new(|| {
            Regex::new(concat!("(?i)", $prefix, r#"\s+[`"\[]?(\w+)[`"\]]?"#))
                .expect("static table pattern")
        })
    };
}

static SELECT_TABLE: Lazy<Regex> = table_regex!(r"\bFROM");
static INSERT_TABLE: Lazy<Regex> = table_regex!(r"\bINSERT\s+INTO");
static UPDATE_TABLE: Lazy<Regex> = table_regex!(r"\bUPDATE");
static DELETE_TABLE: Lazy<Regex> = table_regex!(r"\bDELETE\s+FROM");
static CREATE_TABLE: Lazy<Regex> =
    table_regex!(r"\bCREATE\s+(?:TEMP(?:ORARY)?\s+)?TABLE(?:\s+IF\s+NOT\s+EXISTS)?");
static DROP_TABLE: Lazy<Regex> = table_regex!(r"\bDROP\s+TABLE(?:\s+IF\s+EXISTS)?");
static ALTER_TABLE: Lazy<Regex> = table_regex!(r"\bALTER\s+TABLE");
static TRUNCATE_TABLE: Lazy<Regex> = table_regex!(r"\bTRUNCATE(?:\s+TABLE)?");

/// Operation and primary table of a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySummary {
    pub operation: SqlOperation,
    pub table: Option<String>,
}

impl QuerySummary {
    pub fn parse(sql: &str) -> Self {
        let head: String = sql
            .trim_start()
            .chars()
            .take(10)
            .collect::<String>()
            .to_uppercase();
        let operation = KEYWORDS
            .iter()
            .find(|(kw, _)| head.starts_with(kw))
            .map_or(SqlOperation::Other, |(_, op)| *op);
        let table = operation
            .table_pattern()
            .and_then(|re| re.captures(sql))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_lowercase());
        Self { operation, table }
    }
}
