//! Bound-tool adapter — turn a typed tool contract plus an implementation
//! into a schema-agnostic [`BoundToolRuntime`].
//!
//! Input and output shapes are plain serde types. Validation means
//! "deserializes into the contract type"; the validated value handed on is
//! the re-serialized form, so defaults are filled in and unknown fields
//! dropped (or rejected, with `#[serde(deny_unknown_fields)]`).

use async_trait::async_trait;
use cogni_core::capability::Capabilities;
use cogni_core::error::ToolError;
use cogni_core::tool::{
    BoundToolRuntime, RedactionConfig, ToolEffect, ToolInvocationContext, ToolSpec,
    namespaced_tool_id,
};
use cogni_security::redact_top_level;
use futures::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

type ValidateFn = dyn Fn(&Value) -> Result<Value, ToolError> + Send + Sync;
type ExecFn = dyn Fn(Value, ToolInvocationContext, Capabilities) -> BoxFuture<'static, Result<Value, ToolError>>
    + Send
    + Sync;

/// Custom redactor over a validated output.
pub type RedactFn = dyn Fn(&Value) -> Result<Value, ToolError> + Send + Sync;

/// Declarative description of a tool with typed input `I` and output `O`.
pub struct ToolContract<I, O> {
    id: String,
    description: String,
    input_schema: Value,
    effect: ToolEffect,
    output_allowlist: Vec<String>,
    redactor: Option<Arc<RedactFn>>,
    requires_connection: bool,
    capabilities: Vec<String>,
    _shape: PhantomData<fn(I) -> O>,
}

impl<I, O> ToolContract<I, O>
where
    I: DeserializeOwned + Serialize + Send + 'static,
    O: DeserializeOwned + Serialize + Send + 'static,
{
    pub fn new(
        namespace: &str,
        name: &str,
        description: impl Into<String>,
        effect: ToolEffect,
    ) -> Self {
        Self {
            id: namespaced_tool_id(namespace, name),
            description: description.into(),
            input_schema: serde_json::json!({"type": "object", "properties": {}}),
            effect,
            output_allowlist: Vec::new(),
            redactor: None,
            requires_connection: false,
            capabilities: Vec::new(),
            _shape: PhantomData,
        }
    }

    /// JSON Schema sent to the model.
    pub fn input_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }

    /// Top-level output keys that survive redaction.
    pub fn output_allowlist(mut self, keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.output_allowlist = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Replace allowlist filtering with a custom redactor.
    pub fn redact_with<F>(mut self, redactor: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, ToolError> + Send + Sync + 'static,
    {
        self.redactor = Some(Arc::new(redactor));
        self
    }

    pub fn requires_connection(mut self, required: bool) -> Self {
        self.requires_connection = required;
        self
    }

    /// Declare a capability the implementation reads.
    pub fn capability(mut self, name: impl Into<String>) -> Self {
        self.capabilities.push(name.into());
        self
    }

    /// Attach the implementation and erase the contract types.
    pub fn bind<F, Fut>(self, implementation: F) -> BoundTool
    where
        F: Fn(I, ToolInvocationContext, Capabilities) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, ToolError>> + Send + 'static,
    {
        let input_id = self.id.clone();
        let validate_input: Arc<ValidateFn> =
            Arc::new(move |raw: &Value| validate_as::<I>(raw, "input", &input_id));

        let output_id = self.id.clone();
        let validate_output: Arc<ValidateFn> =
            Arc::new(move |raw: &Value| validate_as::<O>(raw, "output", &output_id));

        let exec_id = self.id.clone();
        let implementation = Arc::new(implementation);
        let exec: Arc<ExecFn> = Arc::new(
            move |args: Value,
                  ctx: ToolInvocationContext,
                  caps: Capabilities|
                  -> BoxFuture<'static, Result<Value, ToolError>> {
                let implementation = Arc::clone(&implementation);
                let tool_id = exec_id.clone();
                Box::pin(async move {
                    let input: I = serde_json::from_value(args).map_err(|e| {
                        ToolError::Validation(format!("Invalid input for {tool_id}: {e}"))
                    })?;
                    let output = implementation(input, ctx, caps).await?;
                    serde_json::to_value(output).map_err(|e| {
                        ToolError::Execution(format!(
                            "{tool_id} produced unserializable output: {e}"
                        ))
                    })
                })
            },
        );

        BoundTool {
            spec: ToolSpec {
                name: self.id.clone(),
                description: self.description,
                input_schema: self.input_schema,
                effect: self.effect,
                redaction: RedactionConfig::top_level(self.output_allowlist),
            },
            id: self.id,
            requires_connection: self.requires_connection,
            capabilities: self.capabilities,
            validate_input,
            exec,
            validate_output,
            redactor: self.redactor,
        }
    }
}

fn validate_as<T>(raw: &Value, what: &str, tool_id: &str) -> Result<Value, ToolError>
where
    T: DeserializeOwned + Serialize,
{
    let typed: T = serde_json::from_value(raw.clone())
        .map_err(|e| ToolError::Validation(format!("Invalid {what} for {tool_id}: {e}")))?;
    serde_json::to_value(typed)
        .map_err(|e| ToolError::Validation(format!("Invalid {what} for {tool_id}: {e}")))
}

/// A tool contract with its implementation attached.
pub struct BoundTool {
    id: String,
    spec: ToolSpec,
    requires_connection: bool,
    capabilities: Vec<String>,
    validate_input: Arc<ValidateFn>,
    exec: Arc<ExecFn>,
    validate_output: Arc<ValidateFn>,
    redactor: Option<Arc<RedactFn>>,
}

impl BoundTool {
    /// Wrap in an `Arc` for a tool source.
    pub fn into_runtime(self) -> Arc<dyn BoundToolRuntime> {
        Arc::new(self)
    }
}

impl std::fmt::Debug for BoundTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundTool")
            .field("id", &self.id)
            .field("effect", &self.spec.effect)
            .field("requires_connection", &self.requires_connection)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

#[async_trait]
impl BoundToolRuntime for BoundTool {
    fn id(&self) -> &str {
        &self.id
    }

    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    fn requires_connection(&self) -> bool {
        self.requires_connection
    }

    fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    fn validate_input(&self, raw: &Value) -> Result<Value, ToolError> {
        (self.validate_input)(raw)
    }

    async fn exec(
        &self,
        args: Value,
        ctx: &ToolInvocationContext,
        capabilities: &Capabilities,
    ) -> Result<Value, ToolError> {
        (self.exec)(args, ctx.clone(), capabilities.clone()).await
    }

    fn validate_output(&self, raw: &Value) -> Result<Value, ToolError> {
        (self.validate_output)(raw)
    }

    fn redact(&self, output: &Value) -> Result<Value, ToolError> {
        match &self.redactor {
            Some(redactor) => redactor(output),
            None => redact_top_level(output, &self.spec.redaction.allowlist)
                .map_err(|e| ToolError::Redaction(e.to_string())),
        }
    }
}
