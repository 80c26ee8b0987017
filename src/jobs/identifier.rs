use super::JobDescriptor;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentifierSchemeError {
    #[error("Unknown identifier scheme '{0}', supported schemes: sha1")]
    Unknown(String),
}

/// How the watcher derives a cache identifier from a job URL.
///
/// The watcher keys its cache by the lowercase hex SHA-1 of the URL string.
/// Caches keyed by the raw URL are matched before any scheme is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierScheme {
    #[default]
    Sha1,
}

impl IdentifierScheme {
    pub fn identifier_for(&self, url: &str) -> String {
        match self {
            IdentifierScheme::Sha1 => {
                let mut hasher = Sha1::new();
                hasher.update(url.as_bytes());
                format!("{:x}", hasher.finalize())
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IdentifierScheme::Sha1 => "sha1",
        }
    }
}

impl FromStr for IdentifierScheme {
    type Err = IdentifierSchemeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sha1" | "sha-1" => Ok(IdentifierScheme::Sha1),
            _ => Err(IdentifierSchemeError::Unknown(s.to_string())),
        }
    }
}

impl fmt::Display for IdentifierScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct JobMatch<'a> {
    /// Position of the job in the list the index was built from.
    pub position: usize,
    pub job: &'a JobDescriptor,
}

/// Lookup from cache identifiers to configured jobs.
#[derive(Debug, Clone, Default)]
pub struct JobIndex {
    jobs: Vec<JobDescriptor>,
    by_url: HashMap<String, usize>,
    by_identifier: HashMap<String, usize>,
}

impl JobIndex {
    /// Builds the index. When two jobs share a URL the first one wins.
    pub fn new(jobs: &[JobDescriptor], scheme: IdentifierScheme) -> Self {
        let mut by_url = HashMap::with_capacity(jobs.len());
        let mut by_identifier = HashMap::with_capacity(jobs.len());
        for (position, job) in jobs.iter().enumerate() {
            by_url.entry(job.url.clone()).or_insert(position);
            by_identifier
                .entry(scheme.identifier_for(&job.url))
                .or_insert(position);
        }
        JobIndex {
            jobs: jobs.to_vec(),
            by_url,
            by_identifier,
        }
    }

    pub fn resolve(&self, identifier: &str) -> Option<JobMatch<'_>> {
        if let Some(&position) = self.by_url.get(identifier) {
            return Some(JobMatch {
                position,
                job: &self.jobs[position],
            });
        }
        self.by_identifier
            .get(&identifier.trim().to_ascii_lowercase())
            .map(|&position| JobMatch {
                position,
                job: &self.jobs[position],
            })
    }

    pub fn jobs(&self) -> &[JobDescriptor] {
        &self.jobs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha1_identifier_is_lowercase_hex() {
        let identifier = IdentifierScheme::Sha1.identifier_for("https://example.com/");
        assert_eq!(identifier.len(), 40);
        assert!(identifier
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_sha1_identifier_known_value() {
        // sha1("abc")
        assert_eq!(
            IdentifierScheme::Sha1.identifier_for("abc"),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
    }

    #[test]
    fn test_scheme_from_str() {
        assert_eq!("sha1".parse(), Ok(IdentifierScheme::Sha1));
        assert_eq!("SHA-1".parse(), Ok(IdentifierScheme::Sha1));
        assert_eq!(
            "md5".parse::<IdentifierScheme>(),
            Err(IdentifierSchemeError::Unknown("md5".to_string()))
        );
    }

    #[test]
    fn test_index_resolves_url_then_hash() {
        let jobs = vec![
            JobDescriptor::new("A", "https://a.example/"),
            JobDescriptor::new("B", "https://b.example/"),
        ];
        let index = JobIndex::new(&jobs, IdentifierScheme::Sha1);

        let by_url = index.resolve("https://a.example/").unwrap();
        assert_eq!(by_url.job.name, "A");
        assert_eq!(by_url.position, 0);

        let hashed = IdentifierScheme::Sha1.identifier_for("https://b.example/");
        let by_hash = index.resolve(&hashed.to_uppercase()).unwrap();
        assert_eq!(by_hash.job.name, "B");
        assert_eq!(by_hash.position, 1);

        assert!(index.resolve("deadbeef").is_none());
    }

    #[test]
    fn test_index_duplicate_urls_first_wins() {
        let jobs = vec![
            JobDescriptor::new("First", "https://dup.example/"),
            JobDescriptor::new("Second", "https://dup.example/"),
        ];
        let index = JobIndex::new(&jobs, IdentifierScheme::Sha1);
        assert_eq!(index.resolve("https://dup.example/").unwrap().job.name, "First");
    }
}
