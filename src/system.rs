//! Introspection procedures in the `system.*` namespace.
//!
//! These are ordinary registry entries. They read the registry through the
//! [`CallContext`] so the answers always reflect what the calling protocol
//! can actually reach.

use crate::dispatch::CallContext;
use crate::error::ProcedureError;
use crate::fault::Fault;
use crate::protocol::Protocol;
use crate::registry::{Procedure, Signature, TypeSpec};
use crate::value::{Map, Params, Value, ValueKind};

pub const LIST_METHODS: &str = "system.listMethods";
pub const METHOD_SIGNATURE: &str = "system.methodSignature";
pub const METHOD_HELP: &str = "system.methodHelp";
pub const MULTICALL: &str = "system.multicall";

/// Returned by `system.methodSignature` when no signature is declared.
pub const UNDEFINED_SIGNATURE: &str = "undef";

/// Returns the introspection procedures.
pub(crate) fn procedures() -> Vec<Procedure> {
    vec![
        Procedure::new(LIST_METHODS, list_methods)
            .with_signature(Signature::new(ValueKind::List, []))
            .with_help("Returns the names of all procedures available on this protocol."),
        Procedure::new(METHOD_SIGNATURE, method_signature)
            .with_signature(Signature::new(
                TypeSpec::Any,
                [TypeSpec::Of(ValueKind::String)],
            ))
            .with_help(
                "Returns the signatures of a procedure as [[return, param...]], \
                 or \"undef\" if none is declared.",
            ),
        Procedure::new(METHOD_HELP, method_help)
            .with_signature(Signature::new(ValueKind::String, [TypeSpec::Of(ValueKind::String)]))
            .with_help("Returns the documentation of a procedure."),
        Procedure::new(MULTICALL, multicall)
            .with_signature(Signature::new(ValueKind::List, [TypeSpec::Of(ValueKind::List)]))
            .with_help(
                "Runs several calls in one request. Each call is a struct with methodName \
                 and params; each result is [value] or a fault struct.",
            )
            .only(Protocol::XmlRpc),
    ]
}

fn list_methods(context: &CallContext<'_>, _params: &Params) -> Result<Value, ProcedureError> {
    Ok(context
        .registry()
        .list_names_for(context.protocol())
        .into_iter()
        .map(Value::from)
        .collect::<Vec<_>>()
        .into())
}

/// Resolves the procedure named by the first argument, as seen from the
/// calling protocol.
fn target<'a>(context: &'a CallContext<'_>, params: &Params) -> Result<&'a Procedure, ProcedureError> {
    let name: String = params.get(0)?;
    context
        .registry()
        .lookup(&name)
        .filter(|procedure| procedure.is_exposed_on(context.protocol()))
        .ok_or_else(|| ProcedureError::InvalidParams(format!("unknown procedure \"{name}\"")))
}

fn method_signature(context: &CallContext<'_>, params: &Params) -> Result<Value, ProcedureError> {
    let procedure = target(context, params)?;
    Ok(match procedure.signature() {
        Some(signature) => {
            let types: Vec<Value> = signature.type_names().into_iter().map(Value::from).collect();
            Value::List(vec![Value::List(types)])
        }
        None => Value::from(UNDEFINED_SIGNATURE),
    })
}

fn method_help(context: &CallContext<'_>, params: &Params) -> Result<Value, ProcedureError> {
    let procedure = target(context, params)?;
    Ok(Value::from(procedure.help().unwrap_or_default()))
}

fn multicall(context: &CallContext<'_>, params: &Params) -> Result<Value, ProcedureError> {
    let calls: Vec<Value> = params.get(0)?;

    let results = calls
        .iter()
        .map(|call| match run_one(context, call) {
            Ok(value) => Value::List(vec![value]),
            Err(fault) => fault_struct(&fault),
        })
        .collect();

    Ok(Value::List(results))
}

fn run_one(context: &CallContext<'_>, call: &Value) -> Result<Value, Fault> {
    let fields = call
        .as_map()
        .ok_or_else(|| Fault::custom("multicall entry must be a struct"))?;
    let method = fields
        .get("methodName")
        .and_then(Value::as_str)
        .ok_or_else(|| Fault::custom("multicall entry has no methodName"))?;
    if method == MULTICALL {
        return Err(Fault::custom("recursive system.multicall is not allowed"));
    }
    let args = match fields.get("params") {
        None => Vec::new(),
        Some(Value::List(items)) => items.clone(),
        Some(_) => return Err(Fault::custom("multicall params must be an array")),
    };

    context.dispatcher().call(context.protocol(), method, args)
}

fn fault_struct(fault: &Fault) -> Value {
    let mut fields = Map::new();
    fields.insert("faultCode".to_string(), Value::Int(i64::from(fault.code)));
    fields.insert("faultString".to_string(), Value::String(fault.message.clone()));
    Value::Map(fields)
}
