//! KML/GPX import: fetching, parsing, sanitizing and admission

pub mod admin;
pub mod fetch;
pub mod manager;
pub mod parse;
pub mod sanitize;
pub mod validate;

#[cfg(feature = "http")]
pub use admin::HttpKmlMetadataProvider;
#[cfg(feature = "http")]
pub use fetch::HttpFetcher;
pub use admin::KmlMetadata;
pub use fetch::{FetchError, FetchResponse};
pub use manager::{ImportManager, ImportOutcome};
pub use parse::{FileFormat, ParsedDocument, ParsedFeature};
pub use sanitize::Sanitizer;
pub use validate::{ImportSource, ImportValidator, ValidationOutcome, ValidationResult, ValidationStatus};
