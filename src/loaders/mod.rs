//! Document-backed credential sources.
//!
//! Accounts are read from YAML or JSON documents, either a single URL or
//! every matching file under a directory. A document may hold:
//!
//! - a list of accounts,
//! - a mapping of provider keys to `{accounts: [...]}` sections, or
//! - one account (a mapping with a `name` key).

mod directory;
mod document;
mod format;
mod secrets;
mod url;

pub use directory::DirectorySource;
pub use document::parse_definitions;
pub use format::FileFormat;
pub use secrets::{EnvSecrets, FileSecrets, PlainSecrets, SecretResolver, interpolate_env};
pub use url::UrlSource;
