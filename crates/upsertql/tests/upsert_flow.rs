//! End-to-end upsert flow against an in-memory executor.

use std::sync::Arc;

use upsertql::prelude::*;
use upsertql::{
    AttributeConverter, ConverterRegistry, EnumValue, Error, PositionalStatement, SerdeJsonCodec,
    TypeMappingRegistry, ValidationErrorKind, ValueType, WireType,
};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Plan {
    Free,
    Pro,
}

impl Plan {
    fn as_enum_value(self) -> EnumValue {
        match self {
            Plan::Free => EnumValue {
                type_name: "Plan",
                name: "Free",
                ordinal: 0,
            },
            Plan::Pro => EnumValue {
                type_name: "Plan",
                name: "Pro",
                ordinal: 1,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Customer {
    id: Option<i64>,
    email: String,
    plan: Plan,
    tier: Plan,
    version: i64,
    prefs: serde_json::Value,
    email_hash: String,
}

impl Customer {
    fn new(id: Option<i64>, email: &str, version: i64) -> Self {
        Self {
            id,
            email: email.to_string(),
            plan: Plan::Pro,
            tier: Plan::Free,
            version,
            prefs: serde_json::json!({"theme": "dark"}),
            email_hash: email.to_string(),
        }
    }
}

impl Entity for Customer {
    fn describe() -> std::result::Result<EntityMetadata, ValidationError> {
        EntityMetadata::builder("customers")
            .column(ColumnDescriptor::of::<i64>("id", "id").generated(true))
            .column(ColumnDescriptor::of::<String>("email", "email"))
            .column(ColumnDescriptor::new("plan", "plan", ValueType::Enum("Plan")))
            .column(ColumnDescriptor::new("tier", "tier", ValueType::Enum("Plan")).named_enum())
            .column(ColumnDescriptor::of::<i64>("version", "version"))
            .column(ColumnDescriptor::new(
                "prefs",
                "prefs",
                ValueType::Json("Prefs"),
            ))
            .column(ColumnDescriptor::of::<String>("email_hash", "emailHash").converter("reverse"))
            .id("id")
            .unique("email")
            .build()
    }

    fn field_value(&self, field: &str) -> Option<FieldValue> {
        match field {
            "id" => Some(FieldValue::scalar(self.id)),
            "email" => Some(FieldValue::scalar(self.email.as_str())),
            "plan" => Some(FieldValue::Enum(self.plan.as_enum_value())),
            "tier" => Some(FieldValue::Enum(self.tier.as_enum_value())),
            "version" => Some(FieldValue::scalar(self.version)),
            "prefs" => Some(FieldValue::Struct {
                type_name: "Prefs",
                data: self.prefs.clone(),
            }),
            "emailHash" => Some(FieldValue::scalar(self.email_hash.as_str())),
            _ => None,
        }
    }

    fn set_field_value(&mut self, field: &str, value: Value) -> Result<()> {
        match field {
            "id" => {
                self.id = value.as_i64();
                Ok(())
            }
            other => Err(Error::Custom(format!("{other} is not writable"))),
        }
    }
}

struct Reverse;

impl AttributeConverter for Reverse {
    fn convert_to_database_column(&self, value: &FieldValue) -> Result<Value> {
        match value {
            FieldValue::Scalar(Value::Text(s)) => Ok(Value::Text(s.chars().rev().collect())),
            other => Ok(other.clone().into_passthrough()),
        }
    }
}

/// Records statements and returns one sequential generated key per row.
#[derive(Default)]
struct MemoryExecutor {
    statements: Vec<(SqlDialect, PositionalStatement)>,
    next_id: i64,
    fail: bool,
}

impl BatchExecutor for MemoryExecutor {
    fn execute(
        &mut self,
        dialect: SqlDialect,
        statement: &PositionalStatement,
    ) -> Result<ExecutionResult> {
        if self.fail {
            return Err(Error::Execution("connection reset".into()));
        }
        self.statements.push((dialect, statement.clone()));
        let rows = statement.sql.matches("), (").count() + 1;
        let generated_keys = (0..rows)
            .map(|_| {
                self.next_id += 1;
                Row::new(vec!["GENERATED_KEY".into()], vec![Value::BigInt(self.next_id)])
            })
            .collect();
        Ok(ExecutionResult {
            affected: rows as u64,
            generated_keys,
        })
    }
}

fn context(dialect: SqlDialect) -> UpsertContext {
    let converters = Arc::new(ConverterRegistry::new().register("reverse", || Reverse));
    let registry = TypeMappingRegistry::with_defaults(Arc::new(SerdeJsonCodec), converters);
    UpsertContext::with_registry(UpsertConfig::new().dialect(dialect), registry).unwrap()
}

#[test]
fn test_postgres_batch_binds_and_writes_back_keys() {
    let ctx = context(SqlDialect::Postgres);
    let mut executor = MemoryExecutor::default();
    let mut customers = vec![
        Customer::new(None, "ada@example.com", 1),
        Customer::new(None, "bob@example.com", 1),
    ];

    let affected = ctx
        .upsert(&mut executor, "upsertAllOnEmailWhenVersionMore", &mut customers)
        .unwrap();
    assert_eq!(affected, 2);
    assert_eq!(executor.statements.len(), 1);

    let (dialect, statement) = &executor.statements[0];
    assert_eq!(*dialect, SqlDialect::Postgres);
    // Unset generated id is left to the database
    assert!(statement.sql.starts_with(
        "INSERT INTO customers (email, plan, tier, version, prefs, email_hash) VALUES \
         ($1, $2, $3, $4, $5, $6), ($7, $8, $9, $10, $11, $12) ON CONFLICT (email) DO UPDATE SET"
    ));
    assert!(statement.sql.ends_with(
        "version = CASE WHEN EXCLUDED.version > customers.version \
         THEN EXCLUDED.version ELSE customers.version END"
    ));

    let params = &statement.params;
    assert_eq!(params.len(), 12);
    assert_eq!(params[0].value, Value::Text("ada@example.com".into()));
    assert_eq!(params[1].value, Value::Int(1));
    assert_eq!(params[1].wire_type, WireType::INTEGER);
    assert_eq!(params[2].value, Value::Text("Free".into()));
    assert_eq!(params[2].wire_type, WireType::VARCHAR);
    assert_eq!(params[4].value, Value::Text(r#"{"theme":"dark"}"#.into()));
    assert_eq!(params[4].wire_type, WireType::OTHER);
    assert_eq!(params[5].value, Value::Text("moc.elpmaxe@ada".into()));

    assert_eq!(customers[0].id, Some(1));
    assert_eq!(customers[1].id, Some(2));
}

#[test]
fn test_legacy_mysql_runs_one_statement_per_entity() {
    let ctx = context(SqlDialect::MysqlLegacy);
    let mut executor = MemoryExecutor::default();
    let mut customers = vec![
        Customer::new(Some(10), "ada@example.com", 3),
        Customer::new(Some(11), "bob@example.com", 4),
        Customer::new(Some(12), "cy@example.com", 5),
    ];

    let affected = ctx
        .upsert(&mut executor, "upsertAllIgnoringEmailHash", &mut customers)
        .unwrap();
    assert_eq!(affected, 3);
    assert_eq!(executor.statements.len(), 3);
    for (_, statement) in &executor.statements {
        assert!(statement.sql.contains("ON DUPLICATE KEY UPDATE email = VALUES(email)"));
        assert!(!statement.sql.contains("email_hash = VALUES"));
        assert!(!statement.sql.contains('$'));
        assert_eq!(statement.params.len(), 7);
    }
    // Ids were set, nothing is overwritten
    assert_eq!(customers[0].id, Some(10));
    assert_eq!(customers[2].id, Some(12));
}

#[test]
fn test_modern_mysql_from_probe() {
    let config = UpsertConfig::new().probe("MySQL Community Server", "8.0.36");
    let ctx = UpsertContext::new(config).unwrap();
    assert_eq!(ctx.dialect(), SqlDialect::Mysql);

    let sql = ctx
        .prepare::<Customer>("upsertAllOnEmailIgnoringAllFields", 1)
        .unwrap();
    assert!(sql.ends_with("AS new_values ON DUPLICATE KEY UPDATE email = email"));
}

#[test]
fn test_statements_and_plans_are_cached() {
    let ctx = context(SqlDialect::Postgres);
    let a = ctx.prepare::<Customer>("upsertAllOnEmail", 5).unwrap();
    let b = ctx.prepare::<Customer>("upsertAllOnEmail", 5).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(ctx.statement_cache().hits(), 1);

    let p1 = ctx.plan::<Customer>("upsertAllOnEmail").unwrap();
    let p2 = ctx.plan::<Customer>("upsertAllOnEmail").unwrap();
    assert!(Arc::ptr_eq(&p1, &p2));
}

#[test]
fn test_misconfigured_operations_are_reported() {
    let ctx = context(SqlDialect::Postgres);

    let err = ctx.prepare::<Customer>("saveAllOnEmail", 1).unwrap_err();
    assert!(err.is_configuration_error());

    let err = ctx.prepare::<Customer>("upsertAllOnVersion", 1).unwrap_err();
    let validation = err.validation().unwrap();
    assert_eq!(
        validation.columns_for(ValidationErrorKind::NonUniqueOnColumn),
        vec!["version"]
    );

    let err = ctx
        .prepare::<Customer>("upsertAllOnEmailWhenVersionBigger", 1)
        .unwrap_err();
    assert!(
        err.validation()
            .unwrap()
            .has(ValidationErrorKind::UnrecognizedCondition)
    );
}

#[test]
fn test_lenient_conditions_fall_back_to_unconditional() {
    let config = UpsertConfig::new()
        .dialect(SqlDialect::Postgres)
        .strict_conditions(false);
    let ctx = UpsertContext::new(config).unwrap();
    let sql = ctx
        .prepare::<Customer>("upsertAllOnEmailWhenVersionBigger", 1)
        .unwrap();
    assert!(sql.contains("version = EXCLUDED.version"));
    assert!(!sql.contains("CASE WHEN"));
}

#[test]
fn test_mixed_generated_keys_split_into_runs() {
    let ctx = context(SqlDialect::Postgres);
    let mut executor = MemoryExecutor::default();
    let mut customers = vec![
        Customer::new(None, "ada@example.com", 1),
        Customer::new(None, "bob@example.com", 1),
        Customer::new(Some(40), "cy@example.com", 2),
        Customer::new(None, "dee@example.com", 1),
    ];

    let affected = ctx
        .upsert(&mut executor, "upsertAllOnEmail", &mut customers)
        .unwrap();
    assert_eq!(affected, 4);
    assert_eq!(executor.statements.len(), 3);

    let sql: Vec<&str> = executor
        .statements
        .iter()
        .map(|(_, statement)| statement.sql.as_str())
        .collect();
    assert!(sql[0].starts_with("INSERT INTO customers (email, plan,"));
    assert!(sql[0].contains("), ($7,"));
    assert!(sql[1].starts_with("INSERT INTO customers (id, email,"));
    assert_eq!(executor.statements[1].1.params[0].value, Value::BigInt(40));
    assert!(sql[2].starts_with("INSERT INTO customers (email, plan,"));
    assert!(
        executor
            .statements
            .iter()
            .flat_map(|(_, statement)| &statement.params)
            .all(|param| param.value != Value::Null)
    );

    assert_eq!(customers[0].id, Some(1));
    assert_eq!(customers[1].id, Some(2));
    assert_eq!(customers[2].id, Some(40));
    assert_eq!(customers[3].id, Some(4));
}

#[test]
fn test_failed_batch_fails_whole_call() {
    let ctx = context(SqlDialect::Postgres);
    let mut executor = MemoryExecutor {
        fail: true,
        ..MemoryExecutor::default()
    };
    let mut customers = vec![Customer::new(None, "ada@example.com", 1)];
    let err = ctx
        .upsert(&mut executor, "upsertAll", &mut customers)
        .unwrap_err();
    assert!(matches!(err, Error::Execution(_)));
    assert_eq!(customers[0].id, None);
}

#[test]
fn test_empty_batch_is_a_noop() {
    let ctx = context(SqlDialect::Postgres);
    let mut executor = MemoryExecutor::default();
    let mut customers: Vec<Customer> = Vec::new();
    assert_eq!(ctx.upsert(&mut executor, "upsertAll", &mut customers).unwrap(), 0);
    assert!(executor.statements.is_empty());
}

struct Setting {
    key: String,
    value: String,
}

impl Entity for Setting {
    fn describe() -> std::result::Result<EntityMetadata, ValidationError> {
        EntityMetadata::builder("settings")
            .column(ColumnDescriptor::of::<String>("key", "key"))
            .column(ColumnDescriptor::of::<String>("value", "value"))
            .unique("key")
            .build()
    }

    fn field_value(&self, field: &str) -> Option<FieldValue> {
        match field {
            "key" => Some(FieldValue::scalar(self.key.as_str())),
            "value" => Some(FieldValue::scalar(self.value.as_str())),
            _ => None,
        }
    }

    fn set_field_value(&mut self, _field: &str, _value: Value) -> Result<()> {
        Ok(())
    }
}

#[test]
fn test_entity_without_id_upserts_on_unique_constraint() {
    let ctx = context(SqlDialect::Postgres);
    let sql = ctx.prepare::<Setting>("upsertAll", 1).unwrap();
    assert_eq!(
        sql.as_str(),
        "INSERT INTO settings (key, value) VALUES (:key_1, :value_1) \
         ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value"
    );

    let mut executor = MemoryExecutor::default();
    let mut settings = vec![Setting {
        key: "theme".into(),
        value: "dark".into(),
    }];
    ctx.upsert(&mut executor, "upsertAll", &mut settings).unwrap();
    assert_eq!(executor.statements[0].1.params.len(), 2);
}
