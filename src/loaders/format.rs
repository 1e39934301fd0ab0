use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Serialization format of a credential document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileFormat {
    Yaml,
    Json,
}

impl FileFormat {
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Yaml => &["yaml", "yml"],
            Self::Json => &["json"],
        }
    }

    /// `.json` files are JSON, everything else is treated as YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Yaml,
        }
    }

    pub fn is_document(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                [Self::Yaml, Self::Json]
                    .iter()
                    .flat_map(|f| f.extensions())
                    .any(|known| ext.eq_ignore_ascii_case(known))
            })
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Yaml => write!(f, "YAML"),
            Self::Json => write!(f, "JSON"),
        }
    }
}

impl FromStr for FileFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "YAML" | "YML" => Ok(Self::Yaml),
            "JSON" => Ok(Self::Json),
            _ => Err(Error::UnsupportedFormat {
                format: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str() {
        assert_eq!("YAML".parse::<FileFormat>().unwrap(), FileFormat::Yaml);
        assert_eq!("json".parse::<FileFormat>().unwrap(), FileFormat::Json);
        let err = "xml".parse::<FileFormat>().unwrap_err();
        assert!(err.to_string().contains("xml"));
        assert!(err.to_string().contains("[YAML, JSON]"));
    }

    #[test]
    fn test_from_path() {
        assert_eq!(FileFormat::from_path(Path::new("a/kube.json")), FileFormat::Json);
        assert_eq!(FileFormat::from_path(Path::new("a/kube.yml")), FileFormat::Yaml);
        assert_eq!(FileFormat::from_path(Path::new("a/kube")), FileFormat::Yaml);
    }

    #[test]
    fn test_is_document() {
        assert!(FileFormat::is_document(Path::new("x.yaml")));
        assert!(FileFormat::is_document(Path::new("x.YML")));
        assert!(FileFormat::is_document(Path::new("x.json")));
        assert!(!FileFormat::is_document(Path::new("x.txt")));
        assert!(!FileFormat::is_document(Path::new("yml")));
    }

    #[test]
    fn test_serde() {
        assert_eq!(serde_json::to_string(&FileFormat::Yaml).unwrap(), "\"YAML\"");
    }
}
