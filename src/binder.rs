//! Parameter binding: assigns every parameter of a method exactly one wire
//! location and validates the result eagerly.
//!
//! Precedence, first match wins:
//! 1. explicit [`BindingOverride`]
//! 2. `_name` parameter claiming a `:name` capture of the path
//! 3. verb default: query string for GET/HEAD/PUT, named body field otherwise
//!
//! Parameters filled by pre-call hooks get an [`Injection`] instead of a
//! [`Binding`] and never travel on the wire.

use crate::descriptor::{BindingOverride, Direction, MethodDescriptor, ParameterDescriptor};
use crate::error::BuildError;
use crate::route::{Binding, Injection, Location, PathPattern};
use crate::types::Verb;
use std::collections::{HashMap, HashSet};

/// Result of binding one method
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundParameters {
    pub bindings: Vec<Binding>,
    pub injections: Vec<Injection>,
}

/// Bind the parameters of `method`, routed as `verb pattern`.
///
/// `qualified_name` is only used in diagnostics.
pub fn bind(
    qualified_name: &str,
    method: &MethodDescriptor,
    verb: Verb,
    pattern: &PathPattern,
) -> Result<BoundParameters, BuildError> {
    check_pattern(qualified_name, pattern)?;
    let injections = injections(qualified_name, method)?;
    let injected: HashSet<&str> = injections.iter().map(|i| i.parameter.as_str()).collect();

    let mut bindings = Vec::with_capacity(method.parameters.len());
    let mut claimed: HashMap<(&'static str, String), String> = HashMap::new();
    let mut whole_body: Option<String> = None;
    let mut body_field: Option<String> = None;

    for parameter in &method.parameters {
        if injected.contains(parameter.name.as_str()) {
            continue;
        }

        let location = locate(qualified_name, parameter, verb, pattern)?;

        if parameter.direction != Direction::In && !matches!(location, Location::Header { .. }) {
            return Err(BuildError::IllegalDirectionality {
                method: qualified_name.to_string(),
                parameter: parameter.name.clone(),
                direction: parameter.direction.to_string(),
            });
        }

        match &location {
            Location::WholeBody => {
                if let Some(first) = &whole_body {
                    return Err(BuildError::MultipleWholeBody {
                        method: qualified_name.to_string(),
                        first: first.clone(),
                        second: parameter.name.clone(),
                    });
                }
                whole_body = Some(parameter.name.clone());
            }
            Location::BodyField { .. } => {
                body_field.get_or_insert_with(|| parameter.name.clone());
            }
            _ => {}
        }

        if !matches!(location, Location::WholeBody) {
            let key = (location.family(), location.wire_key());
            if let Some(first) = claimed.get(&key) {
                return Err(BuildError::DuplicateWireKey {
                    method: qualified_name.to_string(),
                    location: key.0.to_string(),
                    key: key.1,
                    first: first.clone(),
                    second: parameter.name.clone(),
                });
            }
            claimed.insert(key, parameter.name.clone());
        }

        bindings.push(Binding {
            parameter: parameter.name.clone(),
            shape: parameter.shape.clone(),
            location,
            direction: parameter.direction,
            default: parameter.default.clone(),
        });
    }

    if let (Some(whole_body), Some(field)) = (whole_body, body_field) {
        return Err(BuildError::AmbiguousBody {
            method: qualified_name.to_string(),
            whole_body,
            field,
        });
    }

    for capture in pattern.captures() {
        if !claimed.contains_key(&("path", capture.to_string())) {
            return Err(BuildError::MissingCapture {
                method: qualified_name.to_string(),
                pattern: pattern.to_string(),
                capture: capture.to_string(),
            });
        }
    }

    Ok(BoundParameters {
        bindings,
        injections,
    })
}

fn check_pattern(qualified_name: &str, pattern: &PathPattern) -> Result<(), BuildError> {
    let mut seen = HashSet::new();
    for capture in pattern.captures() {
        if !seen.insert(capture) {
            return Err(BuildError::DuplicateCapture {
                method: qualified_name.to_string(),
                pattern: pattern.to_string(),
                capture: capture.to_string(),
            });
        }
    }
    Ok(())
}

fn injections(qualified_name: &str, method: &MethodDescriptor) -> Result<Vec<Injection>, BuildError> {
    let mut injections: Vec<Injection> = Vec::with_capacity(method.pre_hooks.len());
    for spec in &method.pre_hooks {
        let declared = method.parameter(&spec.inject).is_some();
        let taken = injections.iter().any(|i| i.parameter == spec.inject);
        if !declared || taken {
            return Err(BuildError::UnknownHookParameter {
                method: qualified_name.to_string(),
                hook: spec.hook.clone(),
                parameter: spec.inject.clone(),
            });
        }
        injections.push(Injection {
            parameter: spec.inject.clone(),
            hook: spec.hook.clone(),
        });
    }
    Ok(injections)
}

fn locate(
    qualified_name: &str,
    parameter: &ParameterDescriptor,
    verb: Verb,
    pattern: &PathPattern,
) -> Result<Location, BuildError> {
    if let Some(binding) = &parameter.binding {
        return Ok(match binding {
            BindingOverride::Path => {
                let capture = parameter.capture_name().unwrap_or(&parameter.name);
                if !pattern.has_capture(capture) {
                    return Err(BuildError::UnknownCapture {
                        method: qualified_name.to_string(),
                        parameter: parameter.name.clone(),
                        capture: capture.to_string(),
                        pattern: pattern.to_string(),
                    });
                }
                Location::Path {
                    capture: capture.to_string(),
                }
            }
            BindingOverride::Query { key } => Location::Query {
                key: key.clone().unwrap_or_else(|| parameter.name.clone()),
            },
            BindingOverride::Header { name } => Location::Header { name: name.clone() },
            BindingOverride::BodyField { key } => Location::BodyField {
                key: key.clone().unwrap_or_else(|| parameter.name.clone()),
            },
            BindingOverride::WholeBody => Location::WholeBody,
        });
    }

    if let Some(capture) = parameter.capture_name()
        && pattern.has_capture(capture)
    {
        return Ok(Location::Path {
            capture: capture.to_string(),
        });
    }

    let key = parameter.name.clone();
    if verb.binds_query_by_default() {
        Ok(Location::Query { key })
    } else {
        Ok(Location::BodyField { key })
    }
}
