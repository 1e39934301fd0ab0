use std::sync::Arc;

use serde_json::Value;

use super::format::FileFormat;
use super::secrets::{SecretResolver, resolve_value};
use crate::definitions::CredentialDefinition;
use crate::{Error, Result};

const ACCOUNTS_KEY: &str = "accounts";
const NAME_KEY: &str = "name";

/// Parses the accounts of type `T` out of one credential document.
///
/// String values of the selected accounts are passed through `secrets` and
/// `${ENV}` substitution before conversion. `location` names the document
/// in error messages.
pub fn parse_definitions<T: CredentialDefinition>(
    content: &str,
    format: FileFormat,
    secrets: &dyn SecretResolver,
    location: &str,
) -> Result<Vec<T>> {
    let root = parse_tree(content, format, location)?;
    let accounts = select_accounts(root, T::PROVIDER_KEY, location)?;

    accounts
        .into_iter()
        .enumerate()
        .map(|(index, mut account)| {
            resolve_strings(&mut account, secrets)?;
            serde_json::from_value::<T>(account)
                .map_err(|e| Error::parse(format!("{} (account #{})", location, index), e))
        })
        .collect()
}

/// Runs [`parse_definitions`] on the blocking pool so resolvers may do
/// blocking IO.
pub(crate) async fn parse_definitions_blocking<T: CredentialDefinition>(
    content: String,
    format: FileFormat,
    secrets: Arc<dyn SecretResolver>,
    location: String,
) -> Result<Vec<T>> {
    let label = location.clone();
    tokio::task::spawn_blocking(move || {
        parse_definitions::<T>(&content, format, secrets.as_ref(), &location)
    })
    .await
    .map_err(|e| Error::load(label, e))?
}

fn parse_tree(content: &str, format: FileFormat, location: &str) -> Result<Value> {
    if content.trim().is_empty() {
        return Ok(Value::Null);
    }
    match format {
        FileFormat::Json => serde_json::from_str(content).map_err(|e| Error::parse(location, e)),
        FileFormat::Yaml => {
            serde_yaml_bw::from_str(content).map_err(|e| Error::parse(location, e))
        }
    }
}

fn select_accounts(root: Value, provider_key: &str, location: &str) -> Result<Vec<Value>> {
    match root {
        Value::Null => Ok(Vec::new()),
        Value::Array(accounts) => Ok(accounts),
        Value::Object(mut map) => {
            if let Some(section) = map.remove(provider_key) {
                return provider_accounts(section, provider_key, location);
            }
            if map.contains_key(NAME_KEY) {
                return Ok(vec![Value::Object(map)]);
            }
            Ok(Vec::new())
        }
        other => Err(Error::parse(
            location,
            format!("expected a list or a mapping, found {}", type_name(&other)),
        )),
    }
}

fn provider_accounts(section: Value, provider_key: &str, location: &str) -> Result<Vec<Value>> {
    let missing = || Error::MissingAccounts {
        provider: provider_key.to_string(),
    };
    let Value::Object(mut section) = section else {
        return Err(missing());
    };
    match section.remove(ACCOUNTS_KEY) {
        None | Some(Value::Null) => Err(missing()),
        Some(Value::Array(accounts)) => Ok(accounts),
        Some(other) => Err(Error::parse(
            location,
            format!(
                "\"{}\" of provider {} must be a list, found {}",
                ACCOUNTS_KEY,
                provider_key,
                type_name(&other)
            ),
        )),
    }
}

fn resolve_strings(value: &mut Value, secrets: &dyn SecretResolver) -> Result<()> {
    match value {
        Value::String(s) => *s = resolve_value(s, secrets)?,
        Value::Array(items) => {
            for item in items {
                resolve_strings(item, secrets)?;
            }
        }
        Value::Object(map) => {
            for item in map.values_mut() {
                resolve_strings(item, secrets)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions::{CloudFoundryAccount, DockerRegistryAccount, KubernetesAccount};
    use crate::loaders::{EnvSecrets, PlainSecrets};

    fn parse<T: CredentialDefinition>(content: &str, format: FileFormat) -> Result<Vec<T>> {
        parse_definitions(content, format, &PlainSecrets, "test")
    }

    const MIXED: &str = r#"
kubernetes:
  accounts:
    - name: kube
      context: prod
cloudfoundry:
  accounts:
    - name: cf
      api: api.example.com
dockerRegistry:
  accounts:
    - name: dockerhub
      address: https://index.docker.io
"#;

    #[test]
    fn test_yaml_list() {
        let accounts: Vec<KubernetesAccount> =
            parse("- name: a\n- name: b\n", FileFormat::Yaml).unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[1].name, "b");
    }

    #[test]
    fn test_json_provider_map() {
        let content = r#"{"kubernetes": {"accounts": [{"name": "a"}, {"name": "b"}]}}"#;
        let accounts: Vec<KubernetesAccount> = parse(content, FileFormat::Json).unwrap();
        assert_eq!(accounts.len(), 2);
    }

    #[test]
    fn test_single_account() {
        let accounts: Vec<KubernetesAccount> =
            parse(r#"{"name": "solo", "context": "c"}"#, FileFormat::Json).unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].context.as_deref(), Some("c"));
    }

    #[test]
    fn test_mixed_providers() {
        let kube: Vec<KubernetesAccount> = parse(MIXED, FileFormat::Yaml).unwrap();
        assert_eq!(kube.len(), 1);
        assert_eq!(kube[0].name, "kube");

        let cf: Vec<CloudFoundryAccount> = parse(MIXED, FileFormat::Yaml).unwrap();
        assert_eq!(cf.len(), 1);
        assert_eq!(cf[0].name, "cf");

        let docker: Vec<DockerRegistryAccount> = parse(MIXED, FileFormat::Yaml).unwrap();
        assert_eq!(docker[0].address.as_deref(), Some("https://index.docker.io"));
    }

    #[test]
    fn test_no_accounts_for_provider() {
        let content = "aws:\n  accounts:\n    - name: aws1\n";
        let accounts: Vec<KubernetesAccount> = parse(content, FileFormat::Yaml).unwrap();
        assert!(accounts.is_empty());
    }

    #[test]
    fn test_missing_accounts_entry() {
        let err = parse::<KubernetesAccount>("kubernetes:\n  foo: bar\n", FileFormat::Yaml)
            .unwrap_err();
        assert!(matches!(err, Error::MissingAccounts { provider } if provider == "kubernetes"));

        let err = parse::<KubernetesAccount>("kubernetes:\n", FileFormat::Yaml).unwrap_err();
        assert!(matches!(err, Error::MissingAccounts { .. }));
    }

    #[test]
    fn test_empty_accounts_list() {
        let accounts: Vec<KubernetesAccount> =
            parse("kubernetes:\n  accounts: []\n", FileFormat::Yaml).unwrap();
        assert!(accounts.is_empty());
    }

    #[test]
    fn test_empty_document() {
        assert!(parse::<KubernetesAccount>("", FileFormat::Yaml).unwrap().is_empty());
        assert!(parse::<KubernetesAccount>("  \n", FileFormat::Json).unwrap().is_empty());
    }

    #[test]
    fn test_scalar_root_is_rejected() {
        let err = parse::<KubernetesAccount>("42", FileFormat::Json).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn test_malformed_json() {
        let err = parse::<KubernetesAccount>("{not json", FileFormat::Json).unwrap_err();
        assert!(err.to_string().contains("test"));
    }

    #[test]
    fn test_env_substitution() {
        // SAFETY: Test-only environment setup
        unsafe { std::env::set_var("CREDENTIAL_SOURCES_DOC_NAME", "from-env") };
        let accounts: Vec<KubernetesAccount> = parse(
            "- name: ${CREDENTIAL_SOURCES_DOC_NAME}\n- name: ${CREDENTIAL_SOURCES_DOC_UNSET}\n",
            FileFormat::Yaml,
        )
        .unwrap();
        assert_eq!(accounts[0].name, "from-env");
        assert_eq!(accounts[1].name, "${CREDENTIAL_SOURCES_DOC_UNSET}");
        unsafe { std::env::remove_var("CREDENTIAL_SOURCES_DOC_NAME") };
    }

    #[test]
    fn test_secrets_only_resolved_for_selected_provider() {
        let content = r#"
kubernetes:
  accounts:
    - name: kube
cloudfoundry:
  accounts:
    - name: cf
      password: env:CREDENTIAL_SOURCES_DOC_MISSING_PASSWORD
"#;
        let kube: Vec<KubernetesAccount> =
            parse_definitions(content, FileFormat::Yaml, &EnvSecrets, "test").unwrap();
        assert_eq!(kube.len(), 1);

        let cf = parse_definitions::<CloudFoundryAccount>(content, FileFormat::Yaml, &EnvSecrets, "test");
        assert!(matches!(cf, Err(Error::Secret(_))));
    }

    struct BlockingSecrets;

    impl SecretResolver for BlockingSecrets {
        fn decrypt(&self, value: &str) -> Result<String> {
            // Panics when called from an async worker thread.
            let upper = tokio::runtime::Handle::current()
                .block_on(async { value.to_uppercase() });
            Ok(upper)
        }
    }

    #[tokio::test]
    async fn test_blocking_parse_allows_blocking_resolver() {
        let accounts: Vec<KubernetesAccount> = parse_definitions_blocking(
            "- name: kube\n".to_string(),
            FileFormat::Yaml,
            Arc::new(BlockingSecrets),
            "test".to_string(),
        )
        .await
        .unwrap();
        assert_eq!(accounts[0].name, "KUBE");
    }

    #[test]
    fn test_bad_account_reports_index() {
        let err = parse::<DockerRegistryAccount>(
            r#"[{"name": "ok"}, {"name": "bad", "cacheThreads": "many"}]"#,
            FileFormat::Json,
        )
        .unwrap_err();
        assert!(err.to_string().contains("account #1"));
    }
}
