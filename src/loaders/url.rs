use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use super::document::parse_definitions_blocking;
use super::format::FileFormat;
use super::secrets::SecretResolver;
use crate::definitions::CredentialDefinition;
use crate::source::CredentialSource;
use crate::{Error, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Loads account definitions from a single document addressed by URL.
///
/// Supports `file://`, `http://` and `https://` URLs.
pub struct UrlSource<T> {
    url: Url,
    format: FileFormat,
    secrets: Arc<dyn SecretResolver>,
    client: reqwest::Client,
    _marker: PhantomData<fn() -> T>,
}

impl<T: CredentialDefinition> UrlSource<T> {
    pub fn new(url: Url, format: FileFormat, secrets: Arc<dyn SecretResolver>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            url,
            format,
            secrets,
            client,
            _marker: PhantomData,
        }
    }

    pub fn parse(url: &str, format: FileFormat, secrets: Arc<dyn SecretResolver>) -> Result<Self> {
        let url = Url::parse(url)
            .map_err(|e| Error::config(format!("URL {} is not valid: {}", url, e)))?;
        Ok(Self::new(url, format, secrets))
    }

    /// Shares an existing HTTP client instead of the default one.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    async fn fetch(&self) -> Result<String> {
        let location = self.url.as_str();
        match self.url.scheme() {
            "file" => {
                let path = self
                    .url
                    .to_file_path()
                    .map_err(|_| Error::load(location, "not a local file path"))?;
                tokio::fs::read_to_string(&path)
                    .await
                    .map_err(|e| Error::load(location, e))
            }
            "http" | "https" => {
                let response = self
                    .client
                    .get(self.url.clone())
                    .send()
                    .await
                    .map_err(|e| Error::load(location, e))?;

                let status = response.status();
                if !status.is_success() {
                    return Err(Error::load(location, format!("HTTP {}", status)));
                }
                response.text().await.map_err(|e| Error::load(location, e))
            }
            other => Err(Error::load(
                location,
                format!("unsupported URL scheme '{}'", other),
            )),
        }
    }
}

#[async_trait]
impl<T: CredentialDefinition> CredentialSource for UrlSource<T> {
    type Definition = T;

    fn source_name(&self) -> &str {
        "url"
    }

    async fn definitions(&self) -> Result<Vec<T>> {
        let content = self.fetch().await?;
        let definitions = parse_definitions_blocking::<T>(
            content,
            self.format,
            Arc::clone(&self.secrets),
            self.url.to_string(),
        )
        .await?;

        tracing::debug!(
            url = %self.url,
            count = definitions.len(),
            definition_type = std::any::type_name::<T>(),
            "loaded credentials"
        );
        Ok(definitions)
    }
}

impl<T> fmt::Debug for UrlSource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UrlSource")
            .field("url", &self.url.as_str())
            .field("format", &self.format)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions::{DockerRegistryAccount, KubernetesAccount};
    use crate::loaders::PlainSecrets;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn secrets() -> Arc<dyn SecretResolver> {
        Arc::new(PlainSecrets)
    }

    #[test]
    fn test_invalid_url() {
        let err = UrlSource::<KubernetesAccount>::parse("not a url", FileFormat::Yaml, secrets())
            .unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[tokio::test]
    async fn test_file_url() {
        let temp = tempfile::tempdir().unwrap();
        let file = temp.path().join("accounts.json");
        tokio::fs::write(&file, r#"[{"name": "a"}, {"name": "b"}]"#)
            .await
            .unwrap();

        let url = Url::from_file_path(&file).unwrap();
        let source = UrlSource::<KubernetesAccount>::new(url, FileFormat::Json, secrets());
        assert_eq!(source.definitions().await.unwrap().len(), 2);
        assert_eq!(source.source_name(), "url");
    }

    #[tokio::test]
    async fn test_missing_file() {
        let url = Url::parse("file:///nonexistent/credential-sources/accounts.yml").unwrap();
        let source = UrlSource::<KubernetesAccount>::new(url, FileFormat::Yaml, secrets());
        let err = source.definitions().await.unwrap_err();
        assert!(matches!(err, Error::Load { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_http_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/accounts.yml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "dockerRegistry:\n  accounts:\n    - name: dockerhub\n      address: https://index.docker.io\n",
            ))
            .mount(&server)
            .await;

        let source = UrlSource::<DockerRegistryAccount>::parse(
            &format!("{}/accounts.yml", server.uri()),
            FileFormat::Yaml,
            secrets(),
        )
        .unwrap();

        let accounts = source.definitions().await.unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].name, "dockerhub");
        assert_eq!(accounts[0].paginate_size, 100);
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let source = UrlSource::<KubernetesAccount>::parse(
            &format!("{}/missing.json", server.uri()),
            FileFormat::Json,
            secrets(),
        )
        .unwrap();

        let err = source.definitions().await.unwrap_err();
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_unsupported_scheme() {
        let source = UrlSource::<KubernetesAccount>::parse(
            "ftp://example.com/accounts.yml",
            FileFormat::Yaml,
            secrets(),
        )
        .unwrap();
        let err = source.definitions().await.unwrap_err();
        assert!(err.to_string().contains("ftp"));
    }
}
