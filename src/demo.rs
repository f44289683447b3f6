//! Demonstration procedures served by the `duorpc serve` command.
//!
//! They return one value of every kind and exercise each error path, which
//! makes them convenient targets for interoperability checks.

use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::dispatch::CallContext;
use crate::error::{ProcedureError, RegistryError};
use crate::fault::Fault;
use crate::registry::{Procedure, Registry, Signature, TypeSpec};
use crate::value::{Params, Value, ValueKind};

/// Fault code returned by `raise_fault`.
pub const DEMO_FAULT_CODE: i32 = 4321;

/// Builds the demonstration registry.
///
/// # Errors
///
/// Returns a [`RegistryError`] if two procedures share a name.
pub fn registry(system_methods: bool) -> Result<Registry, RegistryError> {
    let mut registry = if system_methods {
        Registry::with_system_methods()
    } else {
        Registry::new()
    };

    for procedure in procedures() {
        registry.register(procedure)?;
    }
    Ok(registry)
}

fn constant(name: &str, kind: ValueKind, value: fn() -> Value) -> Procedure {
    Procedure::new(name, move |_, _| Ok(value())).with_signature(Signature::new(kind, []))
}

fn procedures() -> Vec<Procedure> {
    vec![
        Procedure::new("guru.test", guru_test)
            .with_signature(Signature::new(
                ValueKind::String,
                [TypeSpec::Of(ValueKind::String)],
            ))
            .with_help("Returns \"Hello <name>!\"."),
        constant("get_true", ValueKind::Bool, || Value::Bool(true)),
        constant("get_false", ValueKind::Bool, || Value::Bool(false)),
        constant("get_null", ValueKind::Null, || Value::Null),
        constant("get_int", ValueKind::Int, || Value::Int(42)),
        constant("get_negative_int", ValueKind::Int, || Value::Int(-42)),
        constant("get_float", ValueKind::Float, get_float),
        constant("get_string", ValueKind::String, || Value::from("abcde")),
        constant("get_bytes", ValueKind::Bytes, || Value::bytes(b"abcde".to_vec())),
        constant("get_date", ValueKind::DateTime, || {
            demo_date().map_or(Value::Null, Value::DateTime)
        }),
        constant("get_list", ValueKind::List, || {
            Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
        }),
        constant("get_struct", ValueKind::Map, || {
            [("x", 1), ("y", 2), ("z", 3)].into_iter().collect()
        }),
        Procedure::new("get_data_type", |_, params| {
            Ok(Value::from(params.get::<Value>(0)?.kind().name()))
        })
        .with_signature(Signature::new(ValueKind::String, [TypeSpec::Any]))
        .with_help("Returns the kind name of its argument."),
        Procedure::new("add_one_month", add_one_month)
            .with_signature(Signature::new(
                ValueKind::DateTime,
                [TypeSpec::Of(ValueKind::DateTime)],
            ))
            .with_help("Adds 31 days to a timestamp."),
        Procedure::new("raise_fault", |_, _| {
            Err(Fault::new(DEMO_FAULT_CODE, "raised on request").into())
        })
        .with_help("Always fails with a handler-chosen fault code."),
        Procedure::new("divide", divide)
            .with_signature(Signature::new(
                ValueKind::Float,
                [TypeSpec::Of(ValueKind::Float), TypeSpec::Of(ValueKind::Float)],
            ))
            .with_help("Divides two numbers. Dividing by zero fails."),
    ]
}

#[allow(clippy::approx_constant)]
fn get_float() -> Value {
    Value::Float(3.14)
}

/// 1987-06-02 08:45:00
fn demo_date() -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(1987, 6, 2).and_then(|date| date.and_hms_opt(8, 45, 0))
}

fn guru_test(_: &CallContext<'_>, params: &Params) -> Result<Value, ProcedureError> {
    let name: String = params.get(0)?;
    Ok(Value::String(format!("Hello {name}!")))
}

fn add_one_month(_: &CallContext<'_>, params: &Params) -> Result<Value, ProcedureError> {
    let date: NaiveDateTime = params.get(0)?;
    date.checked_add_signed(Duration::days(31))
        .map(Value::DateTime)
        .ok_or_else(|| ProcedureError::failed("date out of range"))
}

fn divide(_: &CallContext<'_>, params: &Params) -> Result<Value, ProcedureError> {
    let dividend: f64 = params.get(0)?;
    let divisor: f64 = params.get(1)?;
    if divisor == 0.0 {
        return Err(ProcedureError::failed("division by zero"));
    }
    Ok(Value::Float(dividend / divisor))
}
