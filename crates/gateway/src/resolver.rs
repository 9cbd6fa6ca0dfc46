use std::collections::HashMap;
use std::env;

use crate::error::ResolverError;
use crate::signer::Credentials;
use crate::traits::KeyResolver;

/// Resolves keys from environment variables
pub struct EnvResolver;

impl EnvResolver {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EnvResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyResolver for EnvResolver {
    /// Parses "env:VAR1,VAR2" and returns values from environment
    fn resolve(&self, source: &str) -> Result<HashMap<String, String>, ResolverError> {
        let vars_part = source.strip_prefix("env:").ok_or_else(|| {
            ResolverError::UnsupportedSource(format!("expected 'env:' prefix, got: {}", source))
        })?;
        if vars_part.is_empty() {
            return Err(ResolverError::UnsupportedSource(
                "empty env source".to_string(),
            ));
        }

        let mut result = HashMap::new();
        for var in vars_part.split(',') {
            let var = var.trim();
            if var.is_empty() {
                continue;
            }
            let value = env::var(var).map_err(|_| ResolverError::MissingKey(var.to_string()))?;
            result.insert(var.to_string(), value);
        }

        Ok(result)
    }
}

/// Resolve a key/secret pair from `source` using the named fields
pub fn resolve_credentials(
    resolver: &dyn KeyResolver,
    source: &str,
    key_field: &str,
    secret_field: &str,
) -> Result<Credentials, ResolverError> {
    let mut resolved = resolver.resolve(source)?;
    let key = resolved
        .remove(key_field)
        .ok_or_else(|| ResolverError::MissingKey(key_field.to_string()))?;
    let secret = resolved
        .remove(secret_field)
        .ok_or_else(|| ResolverError::MissingKey(secret_field.to_string()))?;
    Ok(Credentials::new(key, secret))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_env_vars() {
        env::set_var("SG_TEST_KEY1", "value1");
        env::set_var("SG_TEST_KEY2", "value2");

        let resolver = EnvResolver::new();
        let result = resolver.resolve("env:SG_TEST_KEY1, SG_TEST_KEY2").unwrap();

        assert_eq!(result.get("SG_TEST_KEY1"), Some(&"value1".to_string()));
        assert_eq!(result.get("SG_TEST_KEY2"), Some(&"value2".to_string()));

        env::remove_var("SG_TEST_KEY1");
        env::remove_var("SG_TEST_KEY2");
    }

    #[test]
    fn test_missing_var() {
        let resolver = EnvResolver::new();
        let result = resolver.resolve("env:NONEXISTENT_VAR_12345");
        assert!(matches!(result, Err(ResolverError::MissingKey(_))));
    }

    #[test]
    fn test_invalid_source() {
        let resolver = EnvResolver::new();
        let result = resolver.resolve("vault:secret/path");
        assert!(matches!(result, Err(ResolverError::UnsupportedSource(_))));
    }

    #[test]
    fn test_resolve_credentials() {
        env::set_var("SG_CRED_KEY", "access");
        env::set_var("SG_CRED_SECRET", "secret");

        let creds = resolve_credentials(
            &EnvResolver::new(),
            "env:SG_CRED_KEY,SG_CRED_SECRET",
            "SG_CRED_KEY",
            "SG_CRED_SECRET",
        )
        .unwrap();
        assert_eq!(creds.key(), "access");

        let missing = resolve_credentials(
            &EnvResolver::new(),
            "env:SG_CRED_KEY",
            "SG_CRED_KEY",
            "SG_CRED_SECRET",
        );
        assert!(matches!(missing, Err(ResolverError::MissingKey(f)) if f == "SG_CRED_SECRET"));

        env::remove_var("SG_CRED_KEY");
        env::remove_var("SG_CRED_SECRET");
    }
}
