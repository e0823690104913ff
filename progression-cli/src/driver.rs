//! Batch driver: load content and a build, print the resolution as JSON.

use progression_core::content::LoadError;
use progression_core::picks::Step;
use progression_core::resolver::ResolveOutput;
use progression_core::{
    resolve_progression, ContentBundle, EngineConfig, PickStepDeriver, ResolveInput,
};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// What to run, from the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriverConfig {
    pub content: Option<PathBuf>,
    pub build: Option<PathBuf>,
    /// Also derive pick steps for every class in the build.
    pub steps: bool,
}

/// Errors from a driver run.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Missing required argument {0}")]
    MissingArgument(&'static str),

    #[error("Failed to load content: {0}")]
    Content(#[from] LoadError),

    #[error("Failed to read build: {0}")]
    Build(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Parse driver configuration from command line arguments.
pub fn parse_config_from_args(args: &[String]) -> DriverConfig {
    let mut config = DriverConfig::default();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--content" => {
                if let Some(path) = args.get(i + 1) {
                    config.content = Some(PathBuf::from(path));
                    i += 1;
                }
            }
            "--build" => {
                if let Some(path) = args.get(i + 1) {
                    config.build = Some(PathBuf::from(path));
                    i += 1;
                }
            }
            "--steps" => config.steps = true,
            _ => {}
        }
        i += 1;
    }

    config
}

/// Pick steps for one class in the build.
#[derive(Debug, Serialize)]
pub struct ClassSteps {
    pub class_id: String,
    pub level: u8,
    pub steps: Vec<Step>,
}

#[derive(Debug, Serialize)]
struct StepsReport<'a> {
    resolution: &'a ResolveOutput,
    steps: Vec<ClassSteps>,
}

/// Pick steps for every class entry, at its current level.
pub fn derive_steps(
    input: &ResolveInput,
    bundle: &ContentBundle,
    config: &EngineConfig,
) -> Vec<ClassSteps> {
    let deriver = PickStepDeriver::for_bundle(bundle, config);
    input
        .classes
        .iter()
        .map(|entry| ClassSteps {
            class_id: entry.class_id.clone(),
            level: entry.level,
            steps: deriver.resolve_build_steps(
                &entry.class_id,
                entry.subclass_id.as_deref(),
                entry.level,
            ),
        })
        .collect()
}

/// Resolve a build and render the report as pretty JSON.
pub fn render_report(
    input: &ResolveInput,
    bundle: &ContentBundle,
    engine: &EngineConfig,
    with_steps: bool,
) -> serde_json::Result<String> {
    let resolution = resolve_progression(input, bundle);
    if with_steps {
        let report = StepsReport {
            resolution: &resolution,
            steps: derive_steps(input, bundle, engine),
        };
        serde_json::to_string_pretty(&report)
    } else {
        serde_json::to_string_pretty(&resolution)
    }
}

/// Run the driver and print the report to stdout.
pub async fn run(config: DriverConfig) -> Result<(), DriverError> {
    let content = config
        .content
        .ok_or(DriverError::MissingArgument("--content"))?;
    let build = config.build.ok_or(DriverError::MissingArgument("--build"))?;

    let bundle = ContentBundle::load_json(&content).await?;
    tracing::info!(
        path = %content.display(),
        classes = bundle.classes().count(),
        quota_rows = bundle.choices().len(),
        "content loaded"
    );

    let text = tokio::fs::read_to_string(&build).await?;
    let input: ResolveInput = serde_json::from_str(&text)?;

    let engine = EngineConfig::from_env();
    let report = render_report(&input, &bundle, &engine, config.steps)?;
    println!("{report}");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use progression_core::testing::sample_bundle;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_args() {
        let config = parse_config_from_args(&args(&[
            "progression",
            "--content",
            "content.json",
            "--build",
            "build.json",
            "--steps",
        ]));
        assert_eq!(config.content, Some(PathBuf::from("content.json")));
        assert_eq!(config.build, Some(PathBuf::from("build.json")));
        assert!(config.steps);
    }

    #[test]
    fn test_parse_args_missing_value() {
        let config = parse_config_from_args(&args(&["progression", "--content"]));
        assert_eq!(config.content, None);
        assert!(!config.steps);
    }

    #[test]
    fn test_render_plain_report() {
        let input: ResolveInput =
            serde_json::from_str(r#"{"classes": [{"classId": "wizard", "level": 1}]}"#).unwrap();
        let report = render_report(&input, &sample_bundle(), &EngineConfig::new(), false).unwrap();
        let value: serde_json::Value = serde_json::from_str(&report).unwrap();
        assert_eq!(value["total_level"], 1);
        assert!(value.get("steps").is_none());
    }

    #[test]
    fn test_render_report_with_steps() {
        let input = ResolveInput::new().with_class("wizard", 1).with_class("warlock", 2);
        let report = render_report(&input, &sample_bundle(), &EngineConfig::new(), true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&report).unwrap();

        assert_eq!(value["resolution"]["total_level"], 3);
        assert_eq!(value["steps"][0]["class_id"], "wizard");
        assert_eq!(value["steps"][0]["steps"][0]["kind"], "cantrips");
        assert_eq!(value["steps"][1]["steps"][0]["kind"], "invocations");
    }

    #[tokio::test]
    async fn test_run_requires_content() {
        let result = run(DriverConfig::default()).await;
        assert!(matches!(result, Err(DriverError::MissingArgument("--content"))));
    }
}
