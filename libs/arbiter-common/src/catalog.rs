// Problem catalog boundary: read-only lookup of problem definitions by id

use crate::types::Problem;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("duplicate problem id '{0}'")]
    DuplicateId(String),
    #[error("problem '{0}' has an empty entry point")]
    MissingEntryPoint(String),
}

/// Source of problem definitions.
/// Problems are shared behind `Arc` so concurrent judging runs never copy them.
pub trait ProblemCatalog: Send + Sync {
    fn get(&self, id: &str) -> Option<Arc<Problem>>;
    fn ids(&self) -> Vec<String>;
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    problems: Vec<Problem>,
}

/// Catalog loaded once from a `{"problems": [...]}` JSON document
#[derive(Debug, Clone, Default)]
pub struct JsonCatalog {
    problems: HashMap<String, Arc<Problem>>,
    order: Vec<String>,
}

impl JsonCatalog {
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(content)?;
        Self::from_problems(file.problems)
    }

    pub fn from_problems(problems: Vec<Problem>) -> Result<Self, CatalogError> {
        let mut catalog = JsonCatalog::default();
        for problem in problems {
            if problem.entry_point.trim().is_empty() {
                return Err(CatalogError::MissingEntryPoint(problem.id));
            }
            if catalog.problems.contains_key(&problem.id) {
                return Err(CatalogError::DuplicateId(problem.id));
            }
            catalog.order.push(problem.id.clone());
            catalog.problems.insert(problem.id.clone(), Arc::new(problem));
        }
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl ProblemCatalog for JsonCatalog {
    fn get(&self, id: &str) -> Option<Arc<Problem>> {
        self.problems.get(id).cloned()
    }

    /// Ids in catalog file order
    fn ids(&self) -> Vec<String> {
        self.order.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"{
        "problems": [
            {
                "id": "two-sum",
                "title": "Two Sum",
                "category": "arrays",
                "difficulty": "easy",
                "entry_point": "twoSum",
                "test_cases": [
                    {"input": {"nums": [2, 7, 11, 15], "target": 9}, "output": [0, 1]}
                ],
                "templates": {"python": "class Solution:\n    def twoSum(self, nums, target):\n        pass\n"}
            },
            {
                "id": "reverse",
                "title": "Reverse",
                "category": "strings",
                "difficulty": "easy",
                "entry_point": "reverse",
                "test_cases": []
            }
        ]
    }"#;

    #[test]
    fn test_load_and_lookup() {
        let catalog = JsonCatalog::from_json(CATALOG).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.ids(), vec!["two-sum".to_string(), "reverse".to_string()]);

        let problem = catalog.get("two-sum").unwrap();
        assert_eq!(problem.entry_point, "twoSum");
        assert_eq!(problem.test_cases.len(), 1);
        assert!(problem.templates.contains_key(&crate::types::Language::Python));
        assert!(catalog.get("missing").is_none());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let doubled = CATALOG.replace("\"id\": \"reverse\"", "\"id\": \"two-sum\"");
        match JsonCatalog::from_json(&doubled) {
            Err(CatalogError::DuplicateId(id)) => assert_eq!(id, "two-sum"),
            other => panic!("expected duplicate id error, got {:?}", other),
        }
    }

    #[test]
    fn test_shared_problem_is_same_allocation() {
        let catalog = JsonCatalog::from_json(CATALOG).unwrap();
        let a = catalog.get("two-sum").unwrap();
        let b = catalog.get("two-sum").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
