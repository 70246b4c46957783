//! Reduction of the tool's raw result file to the public result schema.
//!
//! The upstream shape varies with tool configuration, so every projected
//! field is optional: anything missing upstream becomes `null` downstream
//! rather than an error.

use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use url::Url;

use super::locator::{locate_result_file, ExtractError};

static NULL: Value = Value::Null;

/// Metrics reported for a completed job.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementResult {
    /// Wall-clock duration of the tool run, e.g. `"48211 ms"`.
    pub execution_time: Option<String>,
    /// First power-consumption sample.
    pub power_consumption: Option<Value>,
    pub statistics: ResultStatistics,
    /// CPU time, e.g. `"12 ms"`.
    pub cpu_time: Option<String>,
    pub google_web_vitals: WebVitals,
    pub browser_scripts: BrowserScripts,
    pub info: ToolInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultStatistics {
    pub power_consumption: PowerStatistics,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PowerStatistics {
    pub median: Option<Value>,
    pub mean: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebVitals {
    pub first_contentful_paint: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BrowserScripts {
    pub browser: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ToolInfo {
    pub browser: Option<Value>,
}

/// Locate, read and project the newest run's result for `url`.
pub async fn extract_result(
    results_root: &Path,
    url: &Url,
    elapsed_ms: u64,
) -> Result<MeasurementResult, ExtractError> {
    let location = locate_result_file(results_root, url).await?;
    let file = location.result_file();

    let unreadable = |message: String| ExtractError::Unreadable {
        domain_dir: location.domain_dir.clone(),
        latest_folder: location.run_dir.clone(),
        message,
    };

    let text = tokio::fs::read_to_string(&file)
        .await
        .map_err(|e| unreadable(e.to_string()))?;
    let raw: Value = serde_json::from_str(&text).map_err(|e| unreadable(e.to_string()))?;

    tracing::debug!(file = %file.display(), "Parsed measurement result");

    Ok(project(&raw, Some(elapsed_ms)))
}

/// Project a raw result document onto [`MeasurementResult`].
///
/// A top-level array is treated as one entry per page; the first is used.
pub fn project(raw: &Value, elapsed_ms: Option<u64>) -> MeasurementResult {
    let page = match raw {
        Value::Array(pages) => pages.first().unwrap_or(&NULL),
        other => other,
    };

    MeasurementResult {
        execution_time: elapsed_ms.map(|ms| format!("{ms} ms")),
        power_consumption: first_sample(page.get("powerConsumption")).cloned(),
        statistics: ResultStatistics {
            power_consumption: PowerStatistics {
                median: non_null(page.pointer("/statistics/powerConsumption/median")),
                mean: non_null(page.pointer("/statistics/powerConsumption/mean")),
            },
        },
        cpu_time: first_sample(page.get("cpu")).and_then(millis_label),
        google_web_vitals: WebVitals {
            first_contentful_paint: non_null(
                first_sample(page.get("googleWebVitals"))
                    .and_then(|v| v.get("firstContentfulPaint")),
            ),
        },
        browser_scripts: BrowserScripts {
            browser: non_null(
                first_sample(page.get("browserScripts")).and_then(|v| v.get("browser")),
            ),
        },
        info: ToolInfo {
            browser: non_null(page.pointer("/info/browser")),
        },
    }
}

/// Per-iteration values come as arrays; take the first iteration.
fn first_sample(value: Option<&Value>) -> Option<&Value> {
    match value? {
        Value::Null => None,
        Value::Array(samples) => samples.first().filter(|v| !v.is_null()),
        other => Some(other),
    }
}

fn non_null(value: Option<&Value>) -> Option<Value> {
    value.filter(|v| !v.is_null()).cloned()
}

fn millis_label(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(format!("{n} ms")),
        Value::String(s) if !s.is_empty() => Some(format!("{s} ms")),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
