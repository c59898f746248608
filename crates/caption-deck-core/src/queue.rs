use crate::config::{resolve_system_prompt, JobConfig};
use crate::error::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// One entry of a queue file. Everything but `directory` is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct QueueJob {
    #[serde(default)]
    pub directory: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    /// Prompt text, or a path to a file holding it.
    #[serde(default)]
    pub system: Option<String>,
}

pub fn load_queue(path: &Path) -> Result<Vec<QueueJob>, Error> {
    let raw = fs::read_to_string(path)?;
    parse_queue(&raw)
}

pub fn parse_queue(raw: &str) -> Result<Vec<QueueJob>, Error> {
    Ok(serde_json::from_str(raw)?)
}

/// Turn queue entries into runnable jobs. `defaults` supplies everything a
/// job leaves out; jobs without a directory are skipped.
pub fn resolve_jobs(jobs: &[QueueJob], defaults: &JobConfig) -> Result<Vec<JobConfig>, Error> {
    let mut resolved = Vec::with_capacity(jobs.len());

    for (index, job) in jobs.iter().enumerate() {
        let Some(directory) = job.directory.as_deref().filter(|d| !d.trim().is_empty()) else {
            warn!("Skipping queue job {}: no directory given", index + 1);
            continue;
        };

        let mut config = defaults.clone();
        config.directory = directory.into();
        if let Some(model) = job.model.as_deref().filter(|m| !m.trim().is_empty()) {
            config.model = model.to_string();
        }
        if let Some(system) = job.system.as_deref() {
            config.prompt = resolve_system_prompt(system)?;
        }
        resolved.push(config);
    }

    info!("Queue has {} runnable jobs of {}", resolved.len(), jobs.len());
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn defaults() -> JobConfig {
        JobConfig::new(&AppConfig::default(), "")
            .with_model("llava:latest")
            .with_prompt("Default prompt")
    }

    #[test]
    fn test_parse_queue_optional_fields() {
        let jobs = parse_queue(
            r#"[
                {"directory": "/a"},
                {"directory": "/b", "model": "bakllava", "system": "Short."},
                {"model": "orphan"}
            ]"#,
        )
        .unwrap();

        assert_eq!(jobs.len(), 3);
        assert_eq!(jobs[0].directory.as_deref(), Some("/a"));
        assert_eq!(jobs[0].model, None);
        assert_eq!(jobs[1].system.as_deref(), Some("Short."));
        assert_eq!(jobs[2].directory, None);
    }

    #[test]
    fn test_parse_queue_rejects_non_array() {
        assert!(matches!(parse_queue(r#"{"directory": "/a"}"#), Err(Error::Json(_))));
    }

    #[test]
    fn test_resolve_jobs_falls_back_and_skips() {
        let jobs = vec![
            QueueJob {
                directory: Some("/photos".to_string()),
                ..Default::default()
            },
            QueueJob {
                directory: None,
                model: Some("ignored".to_string()),
                system: None,
            },
            QueueJob {
                directory: Some("/art".to_string()),
                model: Some("bakllava".to_string()),
                system: Some("Only colors.".to_string()),
            },
        ];

        let resolved = resolve_jobs(&jobs, &defaults()).unwrap();
        assert_eq!(resolved.len(), 2);

        assert_eq!(resolved[0].directory, PathBuf::from("/photos"));
        assert_eq!(resolved[0].model, "llava:latest");
        assert_eq!(resolved[0].prompt, "Default prompt");

        assert_eq!(resolved[1].directory, PathBuf::from("/art"));
        assert_eq!(resolved[1].model, "bakllava");
        assert_eq!(resolved[1].prompt, "Only colors.");
    }

    #[test]
    fn test_system_file_is_read() {
        let tmp = tempdir().unwrap();
        let prompt_file = tmp.path().join("style.txt");
        fs::write(&prompt_file, "\nDescribe textures.\n").unwrap();

        let queue_file = tmp.path().join("queue.json");
        let body = serde_json::json!([{
            "directory": tmp.path(),
            "system": prompt_file,
        }]);
        fs::write(&queue_file, body.to_string()).unwrap();

        let jobs = load_queue(&queue_file).unwrap();
        let resolved = resolve_jobs(&jobs, &defaults()).unwrap();
        assert_eq!(resolved[0].prompt, "Describe textures.");
        assert_eq!(resolved[0].directory, tmp.path());
    }
}
