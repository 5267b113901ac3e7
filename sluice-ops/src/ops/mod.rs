//! String operator factories.

use sluice_core::{OpFactory, OpFn, Params, Result, SluiceError};

/// Adapts a closure into an [`OpFactory`].
///
/// Handy for registering one-off operator types without a dedicated
/// factory struct:
///
/// ```
/// use sluice_core::{OpRegistry, OpFn, Result};
/// use sluice_ops::WrapFactory;
///
/// let mut registry = OpRegistry::new();
/// registry.register(
///     "lowercase",
///     WrapFactory::new(|_name, _type, _params| -> Result<OpFn> {
///         Ok(Box::new(|ctx| {
///             let value = ctx.input(0).get::<String>()?.to_lowercase();
///             ctx.output(0).set(value);
///             Ok(())
///         }))
///     }),
/// )?;
/// # Ok::<(), sluice_core::SluiceError>(())
/// ```
pub struct WrapFactory<F> {
    create: F,
}

impl<F> WrapFactory<F>
where
    F: Fn(&str, &str, &Params) -> Result<OpFn> + Send + Sync,
{
    /// Wrap a creation closure.
    pub fn new(create: F) -> Self {
        Self { create }
    }
}

impl<F> OpFactory for WrapFactory<F>
where
    F: Fn(&str, &str, &Params) -> Result<OpFn> + Send + Sync,
{
    fn create_op(&self, name: &str, type_name: &str, params: &Params) -> Result<OpFn> {
        (self.create)(name, type_name, params)
    }
}

fn require_param(name: &str, params: &Params, key: &str) -> Result<String> {
    params
        .get(key)
        .cloned()
        .ok_or_else(|| SluiceError::InvalidParam {
            name: name.to_string(),
            cause: format!("missing required param '{key}'"),
        })
}

/// `str.append`: appends the `value` param to the string input.
///
/// One input, one output. The canonical wiring/testing operator: chains
/// of appends make data flow visible in the final string.
pub struct AppendFactory;

impl OpFactory for AppendFactory {
    fn create_op(&self, name: &str, _type_name: &str, params: &Params) -> Result<OpFn> {
        let suffix = require_param(name, params, "value")?;
        Ok(Box::new(move |ctx| {
            let input = ctx.input(0).get::<String>()?.clone();
            ctx.output(0).set(input + &suffix);
            Ok(())
        }))
    }
}

/// `str.const`: ignores its inputs and emits the `value` param.
///
/// Inputs only gate activation; every declared output receives its own
/// copy of the configured string.
pub struct ConstFactory;

impl OpFactory for ConstFactory {
    fn create_op(&self, name: &str, _type_name: &str, params: &Params) -> Result<OpFn> {
        let value = require_param(name, params, "value")?;
        Ok(Box::new(move |ctx| {
            for output in ctx.outputs() {
                output.set(value.clone());
            }
            Ok(())
        }))
    }
}
