//! File and environment loading for [`SourcesConfig`].

use std::path::{Path, PathBuf};
use std::str::FromStr;

use secrecy::SecretString;

use super::{DirConfig, FilePrefixes, GitConfig, SourcesConfig, UrlConfig};
use crate::loaders::FileFormat;
use crate::{Error, Result};

impl SourcesConfig {
    /// Reads a YAML or JSON configuration file, chosen by extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("unable to read {}: {}", path.display(), e))
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        match FileFormat::from_path(path) {
            FileFormat::Json => serde_json::from_str(&content)
                .map_err(|e| Error::config(format!("{}: {}", path.display(), e))),
            FileFormat::Yaml => serde_yaml_bw::from_str(&content)
                .map_err(|e| Error::config(format!("{}: {}", path.display(), e))),
        }
    }

    /// Overrides fields from `<PREFIX><SECTION>_<FIELD>` environment variables.
    pub fn apply_env(&mut self, prefix: &str) -> Result<()> {
        self.apply_env_with(prefix, |key| std::env::var(key).ok())
    }

    /// Same as [`SourcesConfig::apply_env`] with a custom variable lookup.
    pub fn apply_env_with<F>(&mut self, prefix: &str, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvOverrides { prefix, lookup };
        self.url.apply(&env.section("URL"))?;
        self.dir.apply(&env.section("DIR"))?;
        self.git.apply(&env.section("GIT"))?;
        Ok(())
    }

    /// Reads `path`, applies environment overrides and validates.
    pub fn load(path: impl AsRef<Path>, env_prefix: &str) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env(env_prefix)?;
        config.validate()?;
        Ok(config)
    }
}

struct EnvOverrides<'a, F> {
    prefix: &'a str,
    lookup: F,
}

impl<'a, F> EnvOverrides<'a, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn section(&self, section: &'static str) -> Section<'_, 'a, F> {
        Section { env: self, section }
    }
}

struct Section<'e, 'a, F> {
    env: &'e EnvOverrides<'a, F>,
    section: &'static str,
}

impl<F> Section<'_, '_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn env_key(&self, field: &str) -> String {
        format!("{}{}_{}", self.env.prefix, self.section, upper_snake(field))
    }

    fn string(&self, field: &str, target: &mut String) {
        if let Some(value) = (self.env.lookup)(&self.env_key(field)) {
            *target = value;
        }
    }

    fn opt_string(&self, field: &str, target: &mut Option<String>) {
        if let Some(value) = (self.env.lookup)(&self.env_key(field)) {
            *target = Some(value);
        }
    }

    fn opt_path(&self, field: &str, target: &mut Option<PathBuf>) {
        if let Some(value) = (self.env.lookup)(&self.env_key(field)) {
            *target = Some(PathBuf::from(value));
        }
    }

    fn secret(&self, field: &str, target: &mut Option<SecretString>) {
        if let Some(value) = (self.env.lookup)(&self.env_key(field)) {
            *target = Some(SecretString::from(value));
        }
    }

    fn parsed<T: FromStr>(&self, field: &str, target: &mut T) -> Result<()>
    where
        T::Err: std::fmt::Display,
    {
        let key = self.env_key(field);
        if let Some(value) = (self.env.lookup)(&key) {
            *target = value
                .trim()
                .parse()
                .map_err(|e| Error::config(format!("invalid value for {}: {}", key, e)))?;
        }
        Ok(())
    }

    fn prefixes(&self, target: &mut FilePrefixes) {
        self.string("configFilePrefix.default", &mut target.default);
        self.string("configFilePrefix.kubernetes", &mut target.kubernetes);
        self.string("configFilePrefix.cloudfoundry", &mut target.cloudfoundry);
        self.string("configFilePrefix.aws", &mut target.aws);
        self.string("configFilePrefix.ecs", &mut target.ecs);
        self.string("configFilePrefix.dockerRegistry", &mut target.docker_registry);
    }
}

impl UrlConfig {
    fn apply<F: Fn(&str) -> Option<String>>(&mut self, env: &Section<'_, '_, F>) -> Result<()> {
        env.parsed("enabled", &mut self.enabled)?;
        env.opt_string("url", &mut self.url);
        env.opt_string("format", &mut self.format);
        Ok(())
    }
}

impl DirConfig {
    fn apply<F: Fn(&str) -> Option<String>>(&mut self, env: &Section<'_, '_, F>) -> Result<()> {
        env.parsed("enabled", &mut self.enabled)?;
        env.opt_path("path", &mut self.path);
        env.prefixes(&mut self.config_file_prefix);
        Ok(())
    }
}

impl GitConfig {
    fn apply<F: Fn(&str) -> Option<String>>(&mut self, env: &Section<'_, '_, F>) -> Result<()> {
        env.parsed("enabled", &mut self.enabled)?;
        env.parsed("syncIntervalSecs", &mut self.sync_interval_secs)?;
        env.string("repo", &mut self.repo);
        env.string("branch", &mut self.branch);
        env.opt_path("localCloneDir", &mut self.local_clone_dir);
        env.string("repoSubdir", &mut self.repo_subdir);
        env.prefixes(&mut self.config_file_prefix);
        env.opt_string("username", &mut self.username);
        env.secret("password", &mut self.password);
        env.secret("token", &mut self.token);
        env.opt_path("sshPrivateKeyFilePath", &mut self.ssh_private_key_file_path);
        env.secret("sshPrivateKeyPassphrase", &mut self.ssh_private_key_passphrase);
        env.opt_path("sshKnownHostsFilePath", &mut self.ssh_known_hosts_file_path);
        env.parsed("sshTrustUnknownHosts", &mut self.ssh_trust_unknown_hosts)?;
        Ok(())
    }
}

/// `syncIntervalSecs` -> `SYNC_INTERVAL_SECS`, `a.b` -> `A_B`.
fn upper_snake(field: &str) -> String {
    let mut out = String::with_capacity(field.len() + 4);
    for c in field.chars() {
        if c == '.' {
            out.push('_');
        } else if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c);
        } else {
            out.push(c.to_ascii_uppercase());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceMode;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_upper_snake() {
        assert_eq!(upper_snake("enabled"), "ENABLED");
        assert_eq!(upper_snake("syncIntervalSecs"), "SYNC_INTERVAL_SECS");
        assert_eq!(
            upper_snake("configFilePrefix.dockerRegistry"),
            "CONFIG_FILE_PREFIX_DOCKER_REGISTRY"
        );
    }

    #[test]
    fn test_from_yaml_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("sources.yml");
        std::fs::write(
            &path,
            "dir:\n  enabled: true\n  path: /etc/accounts\n  configFilePrefix:\n    default: spinnaker\n",
        )
        .unwrap();

        let config = SourcesConfig::from_file(&path).unwrap();
        assert!(config.dir.enabled);
        assert_eq!(config.dir.path, Some(PathBuf::from("/etc/accounts")));
        assert_eq!(config.dir.config_file_prefix.default, "spinnaker");
        assert_eq!(config.dir.config_file_prefix.kubernetes, "kube");
    }

    #[test]
    fn test_from_json_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("sources.json");
        std::fs::write(
            &path,
            r#"{"url": {"enabled": true, "url": "https://example.com/a.json", "format": "JSON"}}"#,
        )
        .unwrap();

        let config = SourcesConfig::from_file(&path).unwrap();
        assert_eq!(config.mode().unwrap(), SourceMode::Url);
    }

    #[test]
    fn test_missing_file() {
        let err = SourcesConfig::from_file("/nonexistent/sources.yml").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = SourcesConfig::default();
        config
            .apply_env_with(
                "CS_",
                lookup(&[
                    ("CS_GIT_ENABLED", "true"),
                    ("CS_GIT_REPO", "https://github.com/example/accounts.git"),
                    ("CS_GIT_SYNC_INTERVAL_SECS", "15"),
                    ("CS_GIT_TOKEN", "ghp_secret"),
                    ("CS_GIT_CONFIG_FILE_PREFIX_KUBERNETES", "k8s"),
                    ("CS_URL_FORMAT", "JSON"),
                ]),
            )
            .unwrap();

        assert!(config.git.enabled);
        assert_eq!(config.git.sync_interval_secs, 15);
        assert_eq!(config.git.token.as_ref().unwrap().expose_secret(), "ghp_secret");
        assert_eq!(config.git.config_file_prefix.kubernetes, "k8s");
        assert_eq!(config.url.format.as_deref(), Some("JSON"));
        assert!(!config.url.enabled);
        config.validate().unwrap();
    }

    #[test]
    fn test_env_invalid_value() {
        let mut config = SourcesConfig::default();
        let err = config
            .apply_env_with("CS_", lookup(&[("CS_DIR_ENABLED", "sometimes")]))
            .unwrap_err();
        assert!(err.to_string().contains("CS_DIR_ENABLED"));
    }

    #[test]
    fn test_load_applies_process_env() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("sources.yml");
        std::fs::write(&path, "dir:\n  path: /etc/accounts\n").unwrap();

        // SAFETY: Test-only environment setup
        unsafe { std::env::set_var("CREDENTIAL_SOURCES_LOADER_TEST_DIR_ENABLED", "true") };
        let config = SourcesConfig::load(&path, "CREDENTIAL_SOURCES_LOADER_TEST_").unwrap();
        unsafe { std::env::remove_var("CREDENTIAL_SOURCES_LOADER_TEST_DIR_ENABLED") };

        assert_eq!(config.mode().unwrap(), SourceMode::Dir);
    }

    #[test]
    fn test_load_rejects_invalid() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("sources.yml");
        std::fs::write(&path, "dir:\n  enabled: true\ngit:\n  enabled: true\n  repo: r\n").unwrap();
        assert!(SourcesConfig::load(&path, "CREDENTIAL_SOURCES_UNUSED_").is_err());
    }
}
