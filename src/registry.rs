//! Procedure registry.
//!
//! Procedures are registered while the server is being assembled and the
//! registry is read-only afterwards. Introspection procedures are ordinary
//! entries, added by [`Registry::with_system_methods`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::dispatch::CallContext;
use crate::error::{ProcedureError, RegistryError};
use crate::protocol::{Protocol, ProtocolSet};
use crate::value::{Params, Value, ValueKind};

/// A procedure implementation.
pub type Handler =
    Arc<dyn Fn(&CallContext<'_>, &Params) -> Result<Value, ProcedureError> + Send + Sync>;

/// A parameter or return type in a [`Signature`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeSpec {
    /// Any kind of value.
    Any,
    /// Exactly this kind.
    Of(ValueKind),
}

impl TypeSpec {
    /// Returns the name reported by `system.methodSignature`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Of(kind) => kind.name(),
        }
    }
}

impl From<ValueKind> for TypeSpec {
    fn from(kind: ValueKind) -> Self {
        Self::Of(kind)
    }
}

/// Declared return and parameter types of a procedure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub returns: TypeSpec,
    pub params: Vec<TypeSpec>,
}

impl Signature {
    #[must_use]
    pub fn new(returns: impl Into<TypeSpec>, params: impl IntoIterator<Item = TypeSpec>) -> Self {
        Self {
            returns: returns.into(),
            params: params.into_iter().collect(),
        }
    }

    /// Returns `[return, param...]` as kind names.
    #[must_use]
    pub fn type_names(&self) -> Vec<&'static str> {
        std::iter::once(self.returns)
            .chain(self.params.iter().copied())
            .map(TypeSpec::name)
            .collect()
    }
}

/// A named, invocable procedure.
#[derive(Clone)]
pub struct Procedure {
    name: String,
    handler: Handler,
    signature: Option<Signature>,
    help: Option<String>,
    protocols: ProtocolSet,
}

impl Procedure {
    /// Creates a procedure exposed on both protocols.
    pub fn new<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&CallContext<'_>, &Params) -> Result<Value, ProcedureError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            handler: Arc::new(handler),
            signature: None,
            help: None,
            protocols: ProtocolSet::ALL,
        }
    }

    /// Declares the signature. Calls with a different argument count are
    /// rejected before the handler runs.
    #[must_use]
    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signature = Some(signature);
        self
    }

    #[must_use]
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Restricts the procedure to a single protocol.
    #[must_use]
    pub const fn only(mut self, protocol: Protocol) -> Self {
        self.protocols = ProtocolSet::only(protocol);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    #[must_use]
    pub fn help(&self) -> Option<&str> {
        self.help.as_deref()
    }

    #[must_use]
    pub const fn protocols(&self) -> ProtocolSet {
        self.protocols
    }

    #[must_use]
    pub const fn is_exposed_on(&self, protocol: Protocol) -> bool {
        self.protocols.contains(protocol)
    }

    /// Checks the argument count against the signature, then runs the handler.
    ///
    /// # Errors
    ///
    /// Returns whatever the handler returns, or
    /// [`ProcedureError::InvalidParams`] on an arity mismatch.
    pub fn invoke(&self, context: &CallContext<'_>, params: &Params) -> Result<Value, ProcedureError> {
        if let Some(signature) = &self.signature {
            params.expect_len(signature.params.len())?;
        }
        (self.handler)(context, params)
    }
}

impl fmt::Debug for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Procedure")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .field("help", &self.help)
            .field("protocols", &self.protocols)
            .finish_non_exhaustive()
    }
}

/// Name-to-procedure table.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    procedures: BTreeMap<String, Procedure>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the `system.*` introspection procedures.
    #[must_use]
    pub fn with_system_methods() -> Self {
        let mut registry = Self::new();
        for procedure in crate::system::procedures() {
            registry.procedures.insert(procedure.name.clone(), procedure);
        }
        registry
    }

    /// Adds a procedure.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateProcedure`] if the name is taken and
    /// [`RegistryError::InvalidName`] if it is empty or contains whitespace.
    pub fn register(&mut self, procedure: Procedure) -> Result<(), RegistryError> {
        let name = procedure.name.clone();
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(RegistryError::InvalidName { name });
        }
        if self.procedures.contains_key(&name) {
            return Err(RegistryError::DuplicateProcedure { name });
        }

        tracing::debug!(method = %name, "Registered procedure");
        self.procedures.insert(name, procedure);
        Ok(())
    }

    /// Registers a plain handler without metadata.
    ///
    /// # Errors
    ///
    /// See [`Registry::register`].
    pub fn register_fn<F>(&mut self, name: impl Into<String>, handler: F) -> Result<(), RegistryError>
    where
        F: Fn(&CallContext<'_>, &Params) -> Result<Value, ProcedureError> + Send + Sync + 'static,
    {
        self.register(Procedure::new(name, handler))
    }

    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&Procedure> {
        self.procedures.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.procedures.contains_key(name)
    }

    /// Returns every registered name, sorted.
    #[must_use]
    pub fn list_names(&self) -> Vec<&str> {
        self.procedures.keys().map(String::as_str).collect()
    }

    /// Returns the sorted names exposed on `protocol`.
    #[must_use]
    pub fn list_names_for(&self, protocol: Protocol) -> Vec<&str> {
        self.procedures
            .values()
            .filter(|procedure| procedure.is_exposed_on(protocol))
            .map(Procedure::name)
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.procedures.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.procedures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo() -> Procedure {
        Procedure::new("test.echo", |_, params| Ok(Value::List(params.as_slice().to_vec())))
    }

    #[test]
    fn register_and_lookup() {
        let mut registry = Registry::new();
        registry.register(echo()).unwrap();
        assert!(registry.contains("test.echo"));
        assert_eq!(registry.lookup("test.echo").unwrap().name(), "test.echo");
        assert!(registry.lookup("test.missing").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn duplicate_rejected() {
        let mut registry = Registry::new();
        registry.register(echo()).unwrap();
        assert_eq!(
            registry.register(echo()).unwrap_err(),
            RegistryError::DuplicateProcedure {
                name: "test.echo".to_string()
            }
        );
    }

    #[test]
    fn invalid_names_rejected() {
        let mut registry = Registry::new();
        for name in ["", "has space", "tab\there"] {
            let result = registry.register_fn(name, |_, _| Ok(Value::Null));
            assert!(matches!(result, Err(RegistryError::InvalidName { .. })));
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn names_are_sorted() {
        let mut registry = Registry::with_system_methods();
        registry.register_fn("b.second", |_, _| Ok(Value::Null)).unwrap();
        registry.register_fn("a.first", |_, _| Ok(Value::Null)).unwrap();

        let names = registry.list_names();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
        assert!(names.contains(&"system.listMethods"));
        assert!(names.contains(&"a.first"));
    }

    #[test]
    fn protocol_filtering() {
        let mut registry = Registry::new();
        registry
            .register(Procedure::new("xml.only", |_, _| Ok(Value::Null)).only(Protocol::XmlRpc))
            .unwrap();
        registry.register(echo()).unwrap();

        assert_eq!(registry.list_names_for(Protocol::JsonRpc), vec!["test.echo"]);
        assert_eq!(
            registry.list_names_for(Protocol::XmlRpc),
            vec!["test.echo", "xml.only"]
        );
    }

    #[test]
    fn system_methods_registered() {
        let registry = Registry::with_system_methods();
        for name in [
            "system.listMethods",
            "system.methodHelp",
            "system.methodSignature",
            "system.multicall",
        ] {
            assert!(registry.contains(name), "{name} missing");
        }
        assert!(!registry
            .lookup("system.multicall")
            .unwrap()
            .is_exposed_on(Protocol::JsonRpc));
    }

    #[test]
    fn signature_type_names() {
        let signature = Signature::new(
            ValueKind::String,
            [TypeSpec::Of(ValueKind::Int), TypeSpec::Any],
        );
        assert_eq!(signature.type_names(), vec!["string", "int", "any"]);
    }

    #[test]
    fn debug_omits_handler() {
        let text = format!("{:?}", echo());
        assert!(text.contains("test.echo"));
    }
}
