//! HTTP adapters for the identity provider and the FHIR resource server.
//!
//! The issuer only sees the [`TokenProvider`], [`ResourceDirectory`] and
//! [`BundlePoster`] traits; [`KeycloakTokenProvider`] and [`HapiClient`] are
//! the production implementations.

pub mod bundle;
pub mod client;
pub mod directory;
pub mod error;
pub mod poster;
pub mod token;

pub use bundle::{Bundle, BundleEntry, Group};
pub use client::HapiClient;
pub use directory::{DirectoryResponse, QueryStatus, ResourceDirectory};
pub use error::{AuthError, DirectoryError, PostError};
pub use poster::{BundleAck, BundlePoster};
pub use token::{AccessToken, KeycloakConfig, KeycloakTokenProvider, StaticTokenProvider, TokenProvider};
