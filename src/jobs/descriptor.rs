use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum JobListError {
    #[error("Failed to read job list {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse job list {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to write job list {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize job for {path:?}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("No jobs found in {0:?}")]
    NoJobs(PathBuf),
}

/// A configured monitoring target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub name: String,
    pub url: String,
}

impl JobDescriptor {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        JobDescriptor {
            name: name.into(),
            url: url.into(),
        }
    }

    /// Builds a job from one YAML mapping. Browser jobs use `navigate` instead of `url`;
    /// jobs without a location (shell commands) yield `None`.
    fn from_value(value: &Value) -> Option<Self> {
        let url = value
            .get("url")
            .or_else(|| value.get("navigate"))
            .and_then(Value::as_str)?;
        let name = value.get("name").and_then(Value::as_str).unwrap_or(url);
        Some(JobDescriptor::new(name, url))
    }
}

/// Fields recovered from a job descriptor stored as text in the cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescriptorFields {
    pub name: Option<String>,
    pub url: Option<String>,
}

impl DescriptorFields {
    /// Parses a serialized descriptor as a structured mapping.
    ///
    /// Both JSON and YAML flow mappings are accepted, which includes the
    /// single-quoted `{'url': ..., 'name': ...}` form. Returns `None` for
    /// anything that is not a mapping.
    pub fn parse(text: &str) -> Option<Self> {
        let value: Value = serde_yaml::from_str(text).ok()?;
        if !value.is_mapping() {
            return None;
        }
        let field = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);
        Some(DescriptorFields {
            name: field("name"),
            url: field("url").or_else(|| field("navigate")),
        })
    }
}

/// Collects job mappings from every document, in any of the supported layouts:
/// a `jobs:` sequence, a bare sequence, or one job per document.
fn collect_job_values(content: &str) -> Result<Vec<Value>, serde_yaml::Error> {
    let mut values = Vec::new();
    for document in serde_yaml::Deserializer::from_str(content) {
        let value = Value::deserialize(document)?;
        if let Some(jobs) = value.get("jobs") {
            if let Value::Sequence(items) = jobs {
                values.extend(items.iter().cloned());
            }
            continue;
        }
        match value {
            Value::Null => {}
            Value::Sequence(items) => values.extend(items),
            Value::Mapping(_) => values.push(value),
            other => debug!("Ignoring non-mapping job document: {:?}", other),
        }
    }
    Ok(values)
}

/// Parses job list content. Entries without a URL are skipped.
pub fn parse_jobs(content: &str) -> Result<Vec<JobDescriptor>, serde_yaml::Error> {
    let jobs = collect_job_values(content)?
        .iter()
        .filter_map(|value| {
            let job = JobDescriptor::from_value(value);
            if job.is_none() {
                debug!("Skipping job without a URL: {:?}", value);
            }
            job
        })
        .collect();
    Ok(jobs)
}

pub fn load_jobs(path: &Path) -> Result<Vec<JobDescriptor>, JobListError> {
    let content = std::fs::read_to_string(path).map_err(|source| JobListError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let jobs = parse_jobs(&content).map_err(|source| JobListError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Loaded {} jobs from {:?}", jobs.len(), path);
    Ok(jobs)
}

/// Rewrites a `jobs:` list as a multi-document stream, one job per document,
/// which is the layout the watcher itself reads. Returns the number of jobs written.
pub fn extract_jobs(source: &Path, destination: &Path) -> Result<usize, JobListError> {
    let content = std::fs::read_to_string(source).map_err(|e| JobListError::Read {
        path: source.to_path_buf(),
        source: e,
    })?;
    let value: Value = serde_yaml::from_str(&content).map_err(|e| JobListError::Parse {
        path: source.to_path_buf(),
        source: e,
    })?;

    let jobs = match value.get("jobs") {
        Some(Value::Sequence(items)) if !items.is_empty() => items,
        _ => return Err(JobListError::NoJobs(source.to_path_buf())),
    };

    let mut documents = Vec::with_capacity(jobs.len());
    for job in jobs {
        let document = serde_yaml::to_string(job).map_err(|e| JobListError::Serialize {
            path: destination.to_path_buf(),
            source: e,
        })?;
        documents.push(document);
    }

    std::fs::write(destination, documents.join("---\n")).map_err(|e| JobListError::Write {
        path: destination.to_path_buf(),
        source: e,
    })?;
    info!("Extracted {} jobs to {:?}", jobs.len(), destination);
    Ok(jobs.len())
}
