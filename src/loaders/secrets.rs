use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::{Error, Result};

/// Resolves secret references embedded in credential documents.
///
/// Values that are not references must be returned unchanged. Sources call
/// resolvers from the blocking thread pool, so implementations may block on
/// IO.
pub trait SecretResolver: Send + Sync {
    fn decrypt(&self, value: &str) -> Result<String>;
}

/// Returns every value unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainSecrets;

impl SecretResolver for PlainSecrets {
    fn decrypt(&self, value: &str) -> Result<String> {
        Ok(value.to_string())
    }
}

/// Resolves `env:NAME` to the value of environment variable `NAME`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSecrets;

impl SecretResolver for EnvSecrets {
    fn decrypt(&self, value: &str) -> Result<String> {
        match value.strip_prefix("env:") {
            Some(name) => std::env::var(name)
                .map_err(|e| Error::Secret(format!("environment variable {}: {}", name, e))),
            None => Ok(value.to_string()),
        }
    }
}

/// Resolves `file:PATH` to the trimmed contents of `PATH`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSecrets;

impl SecretResolver for FileSecrets {
    fn decrypt(&self, value: &str) -> Result<String> {
        match value.strip_prefix("file:") {
            Some(path) => std::fs::read_to_string(path)
                .map(|s| s.trim().to_string())
                .map_err(|e| Error::Secret(format!("secret file {}: {}", path, e))),
            None => Ok(value.to_string()),
        }
    }
}

fn env_var_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("valid env var regex"))
}

/// Replaces every `${NAME}` with environment variable `NAME`.
///
/// Unset variables are left as written. Returns `None` if `value` holds no
/// placeholder.
pub fn interpolate_env(value: &str) -> Option<String> {
    let re = env_var_regex();
    if !re.is_match(value) {
        return None;
    }
    let placeholders = re.find_iter(value).count();
    tracing::debug!(placeholders, "substituting environment variables");
    let replaced = re.replace_all(value, |caps: &Captures<'_>| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    });
    Some(replaced.into_owned())
}

/// Decrypts a document string, substituting environment placeholders.
pub(crate) fn resolve_value(value: &str, secrets: &dyn SecretResolver) -> Result<String> {
    let decrypted = secrets.decrypt(value)?;
    match interpolate_env(&decrypted) {
        Some(interpolated) => secrets.decrypt(&interpolated),
        None => Ok(decrypted),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_secrets() {
        assert_eq!(PlainSecrets.decrypt("env:HOME").unwrap(), "env:HOME");
    }

    #[test]
    fn test_env_secrets() {
        // SAFETY: Test-only environment setup
        unsafe { std::env::set_var("CREDENTIAL_SOURCES_TEST_SECRET", "s3cret") };
        assert_eq!(
            EnvSecrets
                .decrypt("env:CREDENTIAL_SOURCES_TEST_SECRET")
                .unwrap(),
            "s3cret"
        );
        assert_eq!(EnvSecrets.decrypt("literal").unwrap(), "literal");
        assert!(
            EnvSecrets
                .decrypt("env:CREDENTIAL_SOURCES_TEST_UNSET_SECRET")
                .is_err()
        );
        unsafe { std::env::remove_var("CREDENTIAL_SOURCES_TEST_SECRET") };
    }

    #[test]
    fn test_file_secrets() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("token");
        std::fs::write(&path, "abc123\n").unwrap();

        let reference = format!("file:{}", path.display());
        assert_eq!(FileSecrets.decrypt(&reference).unwrap(), "abc123");
        assert!(FileSecrets.decrypt("file:/nonexistent/secret").is_err());
    }

    #[test]
    fn test_interpolate_env() {
        // SAFETY: Test-only environment setup
        unsafe { std::env::set_var("CREDENTIAL_SOURCES_TEST_REGION", "us-west-2") };
        assert_eq!(
            interpolate_env("region-${CREDENTIAL_SOURCES_TEST_REGION}").as_deref(),
            Some("region-us-west-2")
        );
        assert_eq!(
            interpolate_env("${CREDENTIAL_SOURCES_TEST_UNDEFINED}").as_deref(),
            Some("${CREDENTIAL_SOURCES_TEST_UNDEFINED}")
        );
        assert_eq!(interpolate_env("no placeholders"), None);
        unsafe { std::env::remove_var("CREDENTIAL_SOURCES_TEST_REGION") };
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_interpolate_env_does_not_log_value() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            interpolate_env("token-hunter2-${CREDENTIAL_SOURCES_TEST_LOGGED}");
        });

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("placeholders=1"));
        assert!(!output.contains("hunter2"));
    }

    #[test]
    fn test_resolve_value_decrypts_after_interpolation() {
        // SAFETY: Test-only environment setup
        unsafe {
            std::env::set_var(
                "CREDENTIAL_SOURCES_TEST_REF",
                "env:CREDENTIAL_SOURCES_TEST_TARGET",
            );
            std::env::set_var("CREDENTIAL_SOURCES_TEST_TARGET", "resolved");
        }
        let value = resolve_value("${CREDENTIAL_SOURCES_TEST_REF}", &EnvSecrets).unwrap();
        assert_eq!(value, "resolved");

        let value = resolve_value("${CREDENTIAL_SOURCES_TEST_REF}", &PlainSecrets).unwrap();
        assert_eq!(value, "env:CREDENTIAL_SOURCES_TEST_TARGET");
        unsafe {
            std::env::remove_var("CREDENTIAL_SOURCES_TEST_REF");
            std::env::remove_var("CREDENTIAL_SOURCES_TEST_TARGET");
        }
    }
}
