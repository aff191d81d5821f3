use eyre::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use url::Url;

/// Production Firestore REST endpoint
pub const FIRESTORE_ENDPOINT: &str = "https://firestore.googleapis.com";

pub enum Auth {
    /// Use an OAuth2 access token via the Authorization header
    Bearer(String),
    /// Don't use any authentication
    None,
}

impl std::fmt::Display for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bearer(_) => write!(f, "Bearer"),
            Self::None => write!(f, "None"),
        }
    }
}

/// The fields of a service account key file the client needs
#[derive(Debug, Deserialize)]
pub struct ServiceAccount {
    pub project_id: String,
    #[serde(default)]
    pub client_email: Option<String>,
}

impl ServiceAccount {
    /// Read a service account JSON key file
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).with_context(|| {
            format!("Failed to read service account file: {}", path.display())
        })?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid service account file: {}", path.display()))
    }
}

/// Everything needed to initialize a Firestore client
pub struct Credentials {
    pub project_id: String,
    pub database: String,
    pub endpoint: Url,
    pub auth: Auth,
}

impl Credentials {
    /// Credentials for the production endpoint
    pub fn new(project_id: impl Into<String>, auth: Auth) -> Result<Self> {
        Ok(Self {
            project_id: project_id.into(),
            database: "(default)".to_string(),
            endpoint: Url::parse(FIRESTORE_ENDPOINT)?,
            auth,
        })
    }

    /// Credentials for a local emulator at `host` (e.g. `localhost:8080`)
    ///
    /// The emulator accepts the `owner` token as a fully privileged user.
    pub fn emulator(host: &str, project_id: impl Into<String>) -> Result<Self> {
        let endpoint = Url::parse(&format!("http://{}", host))
            .with_context(|| format!("Invalid emulator host: {}", host))?;
        Ok(Self {
            project_id: project_id.into(),
            database: "(default)".to_string(),
            endpoint,
            auth: Auth::Bearer("owner".to_string()),
        })
    }

    /// Use a named database instead of `(default)`
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }
}
