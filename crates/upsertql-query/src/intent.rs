//! Method-name intent parsing.
//!
//! Operation names follow the convention
//!
//! ```text
//! upsert[All][On<F1>[And<F2>...]][When<Field><Op>][Ignoring<G1>[And<G2>...] | IgnoringAllFields]
//! ```
//!
//! where `<Op>` is one of `More`, `MoreOrEqual`, `Less`, `LessOrEqual`.
//! Clauses are matched in that order, each anchored where the previous one
//! ended, so `On` inside a `When` or `Ignoring` field is never a key.
//! Parsing never fails: anything it does not recognize degrades to "not
//! specified" and is left to plan validation.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

const PREFIX: &str = "upsert";
const BATCH_PREFIX: &str = "upsertAll";
const IGNORE_ALL: &str = "AllFields";

/// Comparison between the incoming and the stored row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOperator {
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
}

impl ComparisonOperator {
    /// Method-name suffixes, longest first so `MoreOrEqual` is never read as `More`.
    const SUFFIXES: [(&'static str, ComparisonOperator); 4] = [
        ("MoreOrEqual", ComparisonOperator::GreaterOrEqual),
        ("LessOrEqual", ComparisonOperator::LessOrEqual),
        ("More", ComparisonOperator::Greater),
        ("Less", ComparisonOperator::Less),
    ];

    /// The SQL operator token.
    pub const fn as_sql(self) -> &'static str {
        match self {
            ComparisonOperator::Greater => ">",
            ComparisonOperator::GreaterOrEqual => ">=",
            ComparisonOperator::Less => "<",
            ComparisonOperator::LessOrEqual => "<=",
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// "Only apply the update branch if `incoming.field <op> stored.field`".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConditionalPredicate {
    /// Entity field name (camelCase, not the SQL column)
    pub field_name: String,
    pub operator: ComparisonOperator,
}

impl ConditionalPredicate {
    pub fn new(field_name: impl Into<String>, operator: ComparisonOperator) -> Self {
        Self {
            field_name: field_name.into(),
            operator,
        }
    }
}

/// Structured operation decoded from a method name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct OperationIntent {
    /// Name began with `upsertAll`
    pub is_batch: bool,
    /// ON fields, snake_cased
    pub on_fields: Vec<String>,
    /// Fields excluded from the update branch, snake_cased
    pub ignored_fields: Vec<String>,
    /// `IgnoringAllFields`: the update branch touches nothing
    pub ignore_all_fields: bool,
    /// Conditional update predicate
    pub predicate: Option<ConditionalPredicate>,
    /// Raw `When` text whose operator suffix was not recognized
    pub unmatched_condition: Option<String>,
}

struct Patterns {
    on: Regex,
    when: Regex,
    ignoring: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        on: Regex::new(r"^On([A-Za-z0-9_]+?)(?:When|Ignoring|$)").expect("static ON pattern"),
        when: Regex::new(r"^When([A-Za-z0-9_]+?)(?:Ignoring|$)").expect("static When pattern"),
        ignoring: Regex::new(r"^Ignoring([A-Za-z0-9_]+)$").expect("static Ignoring pattern"),
    })
}

/// Parse an operation name into an [`OperationIntent`].
///
/// Returns `None` only when `name` does not start with `upsert`.
///
/// # Example
///
/// ```
/// use upsertql_query::intent::{parse, ComparisonOperator};
///
/// let intent = parse("upsertAllOnTenantIdAndLoginWhenVersionMoreOrEqualIgnoringCreatedAt").unwrap();
/// assert!(intent.is_batch);
/// assert_eq!(intent.on_fields, vec!["tenant_id", "login"]);
/// assert_eq!(intent.ignored_fields, vec!["created_at"]);
/// let predicate = intent.predicate.unwrap();
/// assert_eq!(predicate.field_name, "version");
/// assert_eq!(predicate.operator, ComparisonOperator::GreaterOrEqual);
///
/// assert!(parse("saveAll").is_none());
/// ```
pub fn parse(name: &str) -> Option<OperationIntent> {
    let (is_batch, mut rest) = if let Some(rest) = name.strip_prefix(BATCH_PREFIX) {
        (true, rest)
    } else {
        (false, name.strip_prefix(PREFIX)?)
    };

    let patterns = patterns();
    let mut intent = OperationIntent {
        is_batch,
        ..OperationIntent::default()
    };

    if let Some(field) = patterns.on.captures(rest).and_then(|caps| caps.get(1)) {
        intent.on_fields = split_fields(field.as_str());
        rest = &rest[field.end()..];
    }

    if let Some(field) = patterns.when.captures(rest).and_then(|caps| caps.get(1)) {
        let condition = field.as_str();
        rest = &rest[field.end()..];
        intent.predicate = parse_condition(condition);
        if intent.predicate.is_none() {
            tracing::debug!(
                operation = name,
                condition = condition,
                "No comparison operator recognized in When clause"
            );
            intent.unmatched_condition = Some(condition.to_string());
        }
    }

    if let Some(caps) = patterns.ignoring.captures(rest) {
        let ignored = &caps[1];
        if ignored == IGNORE_ALL {
            intent.ignore_all_fields = true;
        } else {
            intent.ignored_fields = split_fields(ignored);
        }
    }

    tracing::trace!(operation = name, intent = ?intent, "Parsed operation intent");
    Some(intent)
}

fn parse_condition(condition: &str) -> Option<ConditionalPredicate> {
    ComparisonOperator::SUFFIXES
        .iter()
        .find_map(|(suffix, operator)| {
            condition
                .strip_suffix(suffix)
                .filter(|field| !field.is_empty())
                .map(|field| ConditionalPredicate::new(lower_first(field), *operator))
        })
}

fn split_fields(segment: &str) -> Vec<String> {
    segment
        .split("And")
        .filter(|part| !part.is_empty())
        .map(camel_to_snake)
        .collect()
}

fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Convert `CamelCase` to `snake_case`.
///
/// An underscore is inserted before each run of uppercase letters, so
/// `UserID` becomes `user_id` and `CreatedAt` becomes `created_at`.
pub fn camel_to_snake(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    let mut prev_upper = false;
    for c in s.chars() {
        if c.is_uppercase() {
            if !prev_upper {
                out.push('_');
            }
            out.extend(c.to_lowercase());
            prev_upper = true;
        } else {
            out.push(c);
            prev_upper = false;
        }
    }
    out.trim_start_matches('_').to_string()
}
