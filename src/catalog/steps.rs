//! Regex step registry and the built-in step library

use std::sync::Arc;

use regex::Regex;

use crate::common::{Error, Result};

use super::{ActionContext, ResolvedStep, StepAction, StepCatalog};

struct StepDefinition {
    pattern: String,
    description: String,
    regex: Regex,
    action: Arc<dyn StepAction>,
}

/// Step catalog backed by anchored regular expressions
///
/// Definitions are tried in registration order and the first match wins.
/// Capture groups become the action's arguments.
#[derive(Default)]
pub struct StepRegistry {
    definitions: Vec<StepDefinition>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in steps
    pub fn with_builtins() -> Result<Self> {
        let mut registry = Self::new();
        registry
            .register(
                r#"set "([^"]*)" to "([^"]*)""#,
                "set a scenario-wide variable",
                |args, cx| {
                    cx.set_scenario(&args[0], &args[1]);
                    Ok(())
                },
            )?
            .register(
                r#"let "([^"]*)" be "([^"]*)""#,
                "set a variable visible to this step's children",
                |args, cx| {
                    cx.set_local(&args[0], &args[1]);
                    Ok(())
                },
            )?
            .register(r#"print "([^"]*)""#, "record a log line", |args, cx| {
                cx.log(&args[0]);
                Ok(())
            })?
            .register(
                r#"increment "([^"]*)""#,
                "add one to a numeric scenario variable",
                |args, cx| {
                    let current = cx.get(&args[0]).unwrap_or("0");
                    let value: i64 = current.parse().map_err(|_| {
                        Error::HardFailure(format!("'{}' is not a number: '{}'", args[0], current))
                    })?;
                    let next = value.checked_add(1).ok_or_else(|| {
                        Error::HardFailure(format!("'{}' overflows when incremented", args[0]))
                    })?;
                    cx.set_scenario(&args[0], next.to_string());
                    Ok(())
                },
            )?
            .register(
                r#"assert "([^"]*)" equals "([^"]*)""#,
                "hard-fail unless both values are equal",
                |args, _| {
                    if args[0] == args[1] {
                        Ok(())
                    } else {
                        Err(Error::HardFailure(format!(
                            "expected '{}' to equal '{}'",
                            args[0], args[1]
                        )))
                    }
                },
            )?
            .register(
                r#"assert "([^"]*)" contains "([^"]*)""#,
                "hard-fail unless the first value contains the second",
                |args, _| {
                    if args[0].contains(args[1].as_str()) {
                        Ok(())
                    } else {
                        Err(Error::HardFailure(format!(
                            "expected '{}' to contain '{}'",
                            args[0], args[1]
                        )))
                    }
                },
            )?
            .register(
                r#"verify "([^"]*)" equals "([^"]*)""#,
                "soft-fail unless both values are equal",
                |args, _| {
                    if args[0] == args[1] {
                        Ok(())
                    } else {
                        Err(Error::SoftFailure(format!(
                            "expected '{}' to equal '{}'",
                            args[0], args[1]
                        )))
                    }
                },
            )?
            .register(r#"fail "([^"]*)""#, "fail the scenario", |args, _| {
                Err(Error::HardFailure(args[0].clone()))
            })?
            .register(r#"soft fail "([^"]*)""#, "soft-fail the scenario", |args, _| {
                Err(Error::SoftFailure(args[0].clone()))
            })?
            .register("end scenario", "skip the remaining ordinary steps", |_, cx| {
                cx.end_scenario();
                Ok(())
            })?;
        Ok(registry)
    }

    /// Register a step definition
    ///
    /// The pattern is anchored at both ends.
    pub fn register<F>(&mut self, pattern: &str, description: &str, action: F) -> Result<&mut Self>
    where
        F: Fn(&[String], &mut ActionContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.register_action(pattern, description, Arc::new(action))
    }

    pub fn register_action(
        &mut self,
        pattern: &str,
        description: &str,
        action: Arc<dyn StepAction>,
    ) -> Result<&mut Self> {
        let regex = Regex::new(&format!("^(?:{})$", pattern))
            .map_err(|e| Error::Config(format!("Invalid step pattern '{}': {}", pattern, e)))?;
        self.definitions.push(StepDefinition {
            pattern: pattern.to_string(),
            description: description.to_string(),
            regex,
            action,
        });
        Ok(self)
    }

    /// Registered `(pattern, description)` pairs in resolution order
    pub fn patterns(&self) -> impl Iterator<Item = (&str, &str)> {
        self.definitions
            .iter()
            .map(|d| (d.pattern.as_str(), d.description.as_str()))
    }
}

impl StepCatalog for StepRegistry {
    fn resolve(&self, text: &str) -> Option<ResolvedStep> {
        let text = text.trim();
        self.definitions.iter().find_map(|definition| {
            let captures = definition.regex.captures(text)?;
            let args = captures
                .iter()
                .skip(1)
                .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
                .collect();
            Some(ResolvedStep {
                pattern: definition.pattern.clone(),
                args,
                action: Arc::clone(&definition.action),
            })
        })
    }
}
