use std::fs;
use std::path::Path;

use schemars::schema_for;
use tracing::info;

use super::FlowError;
use super::model::Flow;

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Reads a flow document; `.yaml`/`.yml` is YAML, anything else JSON.
pub fn load_flow_from_file(path: &Path) -> Result<Flow, FlowError> {
    let text = fs::read_to_string(path)
        .map_err(|e| FlowError::Io(format!("read {}: {}", path.display(), e)))?;
    let mut flow: Flow = if is_yaml(path) {
        serde_yaml_bw::from_str(&text).map_err(|e| FlowError::Serialization(e.to_string()))?
    } else {
        serde_json::from_str(&text).map_err(|e| FlowError::Serialization(e.to_string()))?
    };
    flow.sort_by_order();
    Ok(flow)
}

pub fn save_flow_to_file(path: &Path, flow: &Flow) -> Result<(), FlowError> {
    let text = if is_yaml(path) {
        serde_yaml_bw::to_string(flow).map_err(|e| FlowError::Serialization(e.to_string()))?
    } else {
        serde_json::to_string_pretty(flow).map_err(|e| FlowError::Serialization(e.to_string()))?
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| FlowError::Io(e.to_string()))?;
        }
    }
    fs::write(path, text).map_err(|e| FlowError::Io(format!("write {}: {}", path.display(), e)))?;
    info!(path = %path.display(), steps = flow.steps.len(), "flow written");
    Ok(())
}

/// JSON Schema of the flow document.
pub fn flow_schema() -> Result<String, FlowError> {
    serde_json::to_string_pretty(&schema_for!(Flow))
        .map_err(|e| FlowError::Serialization(e.to_string()))
}

pub fn write_schema(dir: &Path) -> Result<std::path::PathBuf, FlowError> {
    fs::create_dir_all(dir).map_err(|e| FlowError::Io(e.to_string()))?;
    let path = dir.join("flow.schema.json");
    fs::write(&path, flow_schema()?).map_err(|e| FlowError::Io(e.to_string()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::model::{ButtonLink, FlowStep};
    use tempfile::TempDir;

    fn sample() -> Flow {
        let mut flow = Flow::new("welcome");
        let mut a = FlowStep::new("a", 1);
        a.template_name = "greeting".into();
        a.button_links.push(ButtonLink::new("Yes", Some("b".into())));
        flow.steps.push(a);
        flow.steps.push(FlowStep::new("b", 2));
        flow
    }

    #[test]
    fn test_json_and_yaml_files() {
        let dir = TempDir::new().unwrap();
        for name in ["flows/welcome.json", "flows/welcome.yaml"] {
            let path = dir.path().join(name);
            save_flow_to_file(&path, &sample()).unwrap();
            assert_eq!(load_flow_from_file(&path).unwrap(), sample());
        }
    }

    #[test]
    fn test_yaml_keeps_backend_casing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f.yml");
        save_flow_to_file(&path, &sample()).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("flowName: welcome"));
        assert!(text.contains("NextStepId: b"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_flow_from_file(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, FlowError::Io(_)));
    }

    #[test]
    fn test_schema_mentions_steps() {
        let schema = flow_schema().unwrap();
        assert!(schema.contains("\"steps\""));
        assert!(schema.contains("ButtonText"));
    }
}
