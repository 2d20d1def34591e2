//! Feature file types
//!
//! Defines the data structures for deserializing YAML feature files and
//! turning them into scenario descriptors.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Deserialize;

use crate::catalog::tags::normalize_tag;
use crate::catalog::ScenarioDescriptor;
use crate::common::{Error, Result};
use crate::tree::StepSource;

/// A feature file: one feature with its scenarios
#[derive(Deserialize, Debug)]
pub struct FeatureFile {
    /// Name of the feature
    pub feature: String,
    /// Optional free-text description
    pub description: Option<String>,
    /// Tags applied to every scenario of the feature
    #[serde(default)]
    pub tags: Vec<String>,
    /// Steps prepended to every scenario
    #[serde(default)]
    pub background: Vec<StepSpec>,
    /// The scenarios themselves
    #[serde(default)]
    pub scenarios: Vec<ScenarioSpec>,
}

/// One scenario, or a scenario outline when `examples` is non-empty
#[derive(Deserialize, Debug)]
pub struct ScenarioSpec {
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub steps: Vec<StepSpec>,
    /// Example rows; each row yields one scenario
    #[serde(default)]
    pub examples: Vec<BTreeMap<String, serde_yaml::Value>>,
}

/// A step, either as a bare authored line or with a data table
#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum StepSpec {
    Line(String),
    Detailed {
        step: String,
        #[serde(default)]
        table: Vec<Vec<serde_yaml::Value>>,
    },
}

impl StepSpec {
    fn to_source(&self) -> Result<StepSource> {
        match self {
            Self::Line(line) => StepSource::authored(line),
            Self::Detailed { step, table } => {
                let rows = table
                    .iter()
                    .map(|row| row.iter().map(scalar_to_string).collect())
                    .collect();
                Ok(StepSource::authored(step)?.with_table(rows))
            }
        }
    }
}

impl FeatureFile {
    /// Load and parse a feature file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content, path)
    }

    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| Error::FeatureParse {
            path: path.display().to_string(),
            error: e.to_string(),
        })
    }

    /// Expand the feature into runnable scenarios, outlines included
    pub fn into_descriptors(self, source: &Path) -> Result<Vec<ScenarioDescriptor>> {
        let background = self
            .background
            .iter()
            .map(StepSpec::to_source)
            .collect::<Result<Vec<_>>>()?;
        let feature_tags: BTreeSet<String> = self.tags.iter().map(|t| normalize_tag(t)).collect();

        let mut descriptors = Vec::new();
        for scenario in self.scenarios {
            let mut tags = feature_tags.clone();
            tags.extend(scenario.tags.iter().map(|t| normalize_tag(t)));

            let mut steps = background.clone();
            for step in &scenario.steps {
                steps.push(step.to_source()?);
            }

            if scenario.examples.is_empty() {
                descriptors.push(ScenarioDescriptor {
                    name: scenario.name,
                    keyword: "Scenario".to_string(),
                    tags,
                    steps,
                    example_data: None,
                    source: source.to_path_buf(),
                });
                continue;
            }

            for (index, row) in scenario.examples.iter().enumerate() {
                let data = row
                    .iter()
                    .map(|(key, value)| (key.clone(), scalar_to_string(value)))
                    .collect();
                descriptors.push(ScenarioDescriptor {
                    name: format!("{} (example {})", scenario.name, index + 1),
                    keyword: "Scenario Outline".to_string(),
                    tags: tags.clone(),
                    steps: steps.clone(),
                    example_data: Some(data),
                    source: source.to_path_buf(),
                });
            }
        }
        Ok(descriptors)
    }
}

/// Render a YAML scalar the way it was written
fn scalar_to_string(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::Null => String::new(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}
