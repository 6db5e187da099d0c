//! Remote access for the SIS-CodEx group engine.
//!
//! [`HttpRepository`] implements the repository traits of `siscodex-core`
//! against the CodEx JSON API; [`ClientConfig`] layers a config file and
//! `SISCODEX_*` environment variables.

pub mod http;
pub mod settings;

pub use http::{HttpError, HttpRepository};
pub use settings::ClientConfig;
