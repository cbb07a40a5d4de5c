//! Secret keys a chart expects its namespace to provide

use std::collections::BTreeSet;
use std::path::Path;

use crate::error::{CoreError, Result};
use crate::values::ValuesFile;

/// Secret key names declared in the base values file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretDeclarations {
    pub keys: BTreeSet<String>,
}

impl SecretDeclarations {
    /// Read the `secrets:` list of a values file
    pub fn from_values_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let values = ValuesFile::from_file(path)?;
        Ok(Self::from_values(&values))
    }

    pub fn from_values(values: &ValuesFile) -> Self {
        Self {
            keys: values.secret_names().into_iter().collect(),
        }
    }

    /// Fail with every declared key the deployed secret lacks
    pub fn check(&self, namespace: &str, deployed: &BTreeSet<String>) -> Result<()> {
        let missing = missing_secrets(&self.keys, deployed);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(CoreError::MissingSecrets {
                namespace: namespace.to_string(),
                keys: missing,
            })
        }
    }
}

impl<S: Into<String>> FromIterator<S> for SecretDeclarations {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Declared minus deployed, sorted
pub fn missing_secrets(declared: &BTreeSet<String>, deployed: &BTreeSet<String>) -> Vec<String> {
    declared.difference(deployed).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(keys: &[&str]) -> BTreeSet<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn test_missing_key_reported() {
        let declared: SecretDeclarations = ["a", "b", "c"].into_iter().collect();
        let err = declared.check("staging", &set(&["a", "b"])).unwrap_err();
        match err {
            CoreError::MissingSecrets { namespace, keys } => {
                assert_eq!(namespace, "staging");
                assert_eq!(keys, vec!["c"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_in_sync_any_order() {
        let declared: SecretDeclarations = ["c", "a", "b"].into_iter().collect();
        assert!(declared.check("staging", &set(&["b", "c", "a"])).is_ok());
    }

    #[test]
    fn test_extra_deployed_keys_are_fine() {
        let declared: SecretDeclarations = ["a"].into_iter().collect();
        assert!(declared.check("staging", &set(&["a", "legacy"])).is_ok());
    }

    #[test]
    fn test_missing_keys_sorted() {
        let missing = missing_secrets(&set(&["zeta", "alpha", "mid"]), &set(&["mid"]));
        assert_eq!(missing, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_from_values_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("values.yaml");
        std::fs::write(&path, "secrets:\n  - DATABASE_URL\n  - name: API_KEY\n").unwrap();

        let declared = SecretDeclarations::from_values_file(&path).unwrap();
        assert_eq!(declared.keys, set(&["API_KEY", "DATABASE_URL"]));
    }
}
