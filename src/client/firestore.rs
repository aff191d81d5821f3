//! Firestore client module
//!
//! Provides `FirestoreClient` for committing document batches through the
//! Firestore REST API (`documents:commit`).

use super::store::{DocumentStore, MAX_BATCH_WRITES, WriteBatch, validate_collection_id};
use super::{Auth, Credentials};
use crate::value::{Document, DocumentValue};
use chrono::SecondsFormat;
use eyre::{Context, Result};
use reqwest::{Client, Method, StatusCode};
use serde_json::{Map, Value, json};
use url::Url;

/// Firestore client for making API requests.
///
/// Construct it once at startup and share it by reference; the underlying
/// HTTP client pools connections across all commits.
///
/// # Example
/// ```no_run
/// use sql_firestore_migrate::client::{Auth, Credentials, DocumentStore, FirestoreClient, WriteBatch};
/// use sql_firestore_migrate::value::{Document, DocumentValue};
///
/// # async fn example() -> eyre::Result<()> {
/// let credentials = Credentials::new("my-project", Auth::Bearer("ya29.token".into()))?;
/// let client = FirestoreClient::try_new(credentials)?;
///
/// let mut doc = Document::new();
/// doc.insert("call_sign", DocumentValue::String("W1AW".into()));
///
/// let mut batch = WriteBatch::new();
/// batch.set(client.document("licenses")?, &doc);
/// client.commit(batch).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct FirestoreClient {
    client: Client,
    endpoint: Url,
    database: String, // projects/{project}/databases/{database}
}

impl FirestoreClient {
    /// Create a new FirestoreClient from credentials.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built or the token is
    /// not a valid header value
    pub fn try_new(credentials: Credentials) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        match credentials.auth {
            Auth::Bearer(token) => {
                headers.append(
                    reqwest::header::AUTHORIZATION,
                    format!("Bearer {}", token)
                        .parse()
                        .with_context(|| "Access token is not a valid header value")?,
                );
            }
            Auth::None => {}
        }
        let client = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            client,
            endpoint: credentials.endpoint,
            database: format!(
                "projects/{}/databases/{}",
                credentials.project_id, credentials.database
            ),
        })
    }

    /// Resource name of the database, `projects/{p}/databases/{d}`
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Full resource name of a document path
    pub fn document_name(&self, path: &str) -> String {
        format!("{}/documents/{}", self.database, path)
    }

    /// URL for a resource-relative API path
    fn api_url(&self, path: &str) -> Result<Url> {
        let path_stripped = path.strip_prefix('/').unwrap_or(path);
        self.endpoint
            .join(&format!("v1/{}", path_stripped))
            .with_context(|| format!("Invalid API path: {}", path))
    }

    /// Build the JSON body of a commit request for `batch`
    pub fn commit_body(&self, batch: &WriteBatch<'_>) -> Value {
        let writes: Vec<Value> = batch
            .writes()
            .map(|(reference, document)| {
                json!({
                    "update": {
                        "name": self.document_name(&reference.path()),
                        "fields": encode_fields(document),
                    }
                })
            })
            .collect();
        json!({ "writes": writes })
    }

    /// Verify the connection and credentials by listing one document of
    /// `collection`.
    pub async fn test_connection(&self, collection: &str) -> Result<()> {
        validate_collection_id(collection)?;
        let url = self.api_url(&format!(
            "{}/documents/{}?pageSize=1",
            self.database, collection
        ))?;
        let response = self
            .client
            .request(Method::GET, url)
            .send()
            .await
            .with_context(|| "Failed to reach Firestore")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            eyre::bail!("Firestore rejected the request ({}): {}", status, body);
        }
        Ok(())
    }
}

impl DocumentStore for FirestoreClient {
    async fn commit(&self, batch: WriteBatch<'_>) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        if batch.len() > MAX_BATCH_WRITES {
            eyre::bail!(
                "Batch of {} writes exceeds the commit limit of {}",
                batch.len(),
                MAX_BATCH_WRITES
            );
        }

        let url = self.api_url(&format!("{}/documents:commit", self.database))?;
        let body = self.commit_body(&batch);

        log::debug!("Committing {} write(s) to {}", batch.len(), url);

        let response = self
            .client
            .request(Method::POST, url)
            .json(&body)
            .send()
            .await
            .with_context(|| "Failed to send commit request to Firestore")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(commit_error(status, &body));
        }

        Ok(())
    }
}

/// Error for a rejected commit
///
/// Access tokens are not refreshed, so a 401 mid-run means the token expired.
fn commit_error(status: StatusCode, body: &str) -> eyre::Report {
    if status == StatusCode::UNAUTHORIZED {
        eyre::eyre!(
            "Firestore rejected the access token ({}); tokens expire after about an hour, \
             set a fresh FIRESTORE_ACCESS_TOKEN and migrate the failed batches again: {}",
            status,
            body
        )
    } else {
        eyre::eyre!("Failed to commit batch ({}): {}", status, body)
    }
}

/// Encode a document's fields as a Firestore REST `fields` map
pub fn encode_fields(document: &Document) -> Value {
    let fields: Map<String, Value> = document
        .iter()
        .map(|(name, value)| (name.to_string(), encode_value(value)))
        .collect();
    Value::Object(fields)
}

/// Encode one value in Firestore REST form
pub fn encode_value(value: &DocumentValue) -> Value {
    match value {
        DocumentValue::Null => json!({ "nullValue": null }),
        DocumentValue::Boolean(b) => json!({ "booleanValue": b }),
        // int64 travels as a decimal string
        DocumentValue::Integer(n) => json!({ "integerValue": n.to_string() }),
        DocumentValue::Double(x) if x.is_nan() => json!({ "doubleValue": "NaN" }),
        DocumentValue::Double(x) if x.is_infinite() => {
            let text = if x.is_sign_positive() {
                "Infinity"
            } else {
                "-Infinity"
            };
            json!({ "doubleValue": text })
        }
        DocumentValue::Double(x) => json!({ "doubleValue": x }),
        DocumentValue::String(s) => json!({ "stringValue": s }),
        DocumentValue::Timestamp(at) => {
            json!({ "timestampValue": at.to_rfc3339_opts(SecondsFormat::Micros, true) })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::DocumentRef;
    use chrono::{TimeZone, Utc};

    fn client() -> FirestoreClient {
        let creds = Credentials::new("ham-radio", Auth::Bearer("token".into())).unwrap();
        FirestoreClient::try_new(creds).unwrap()
    }

    #[test]
    fn test_client_creation() {
        let client = client();
        assert_eq!(client.database(), "projects/ham-radio/databases/(default)");
        assert_eq!(
            client.document_name("licenses/abc"),
            "projects/ham-radio/databases/(default)/documents/licenses/abc"
        );
    }

    #[test]
    fn test_api_url() {
        let client = client();
        let url = client
            .api_url("/projects/ham-radio/databases/(default)/documents:commit")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://firestore.googleapis.com/v1/projects/ham-radio/databases/(default)/documents:commit"
        );
    }

    #[test]
    fn test_emulator_url() {
        let creds = Credentials::emulator("127.0.0.1:8080", "demo").unwrap();
        let client = FirestoreClient::try_new(creds).unwrap();
        let url = client.api_url("projects/demo/databases/(default)/documents:commit").unwrap();
        assert!(url.as_str().starts_with("http://127.0.0.1:8080/v1/projects/demo/"));
    }

    #[test]
    fn test_commit_error_flags_expired_token() {
        let err = commit_error(StatusCode::UNAUTHORIZED, "UNAUTHENTICATED");
        let message = err.to_string();
        assert!(message.contains("401"));
        assert!(message.contains("FIRESTORE_ACCESS_TOKEN"));
        assert!(message.ends_with("UNAUTHENTICATED"));

        let err = commit_error(StatusCode::SERVICE_UNAVAILABLE, "try again");
        assert_eq!(
            err.to_string(),
            "Failed to commit batch (503 Service Unavailable): try again"
        );
    }

    #[test]
    fn test_encode_values() {
        assert_eq!(encode_value(&DocumentValue::Null), json!({"nullValue": null}));
        assert_eq!(
            encode_value(&DocumentValue::Boolean(true)),
            json!({"booleanValue": true})
        );
        assert_eq!(
            encode_value(&DocumentValue::Integer(-42)),
            json!({"integerValue": "-42"})
        );
        assert_eq!(
            encode_value(&DocumentValue::Double(2.5)),
            json!({"doubleValue": 2.5})
        );
        assert_eq!(
            encode_value(&DocumentValue::Double(f64::NAN)),
            json!({"doubleValue": "NaN"})
        );
        assert_eq!(
            encode_value(&DocumentValue::Double(f64::NEG_INFINITY)),
            json!({"doubleValue": "-Infinity"})
        );
        assert_eq!(
            encode_value(&DocumentValue::String("W1AW".into())),
            json!({"stringValue": "W1AW"})
        );
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(
            encode_value(&DocumentValue::Timestamp(at)),
            json!({"timestampValue": "2024-01-02T03:04:05.000000Z"})
        );
    }

    #[test]
    fn test_commit_body() {
        let client = client();
        let mut doc = Document::new();
        doc.insert("call_sign", DocumentValue::String("K2XYZ".into()));
        doc.insert("class", DocumentValue::Null);

        let reference = DocumentRef::generate("licenses").unwrap();
        let id = reference.id().to_string();
        let mut batch = WriteBatch::new();
        batch.set(reference, &doc);

        let body = client.commit_body(&batch);
        let writes = body["writes"].as_array().unwrap();
        assert_eq!(writes.len(), 1);
        assert_eq!(
            writes[0]["update"]["name"],
            format!(
                "projects/ham-radio/databases/(default)/documents/licenses/{}",
                id
            )
        );
        assert_eq!(
            writes[0]["update"]["fields"],
            json!({
                "call_sign": {"stringValue": "K2XYZ"},
                "class": {"nullValue": null}
            })
        );
    }

    #[tokio::test]
    async fn test_commit_rejects_oversized_batch() {
        let client = client();
        let doc = Document::new();
        let mut batch = WriteBatch::new();
        for _ in 0..=MAX_BATCH_WRITES {
            batch.set(DocumentRef::generate("licenses").unwrap(), &doc);
        }

        let err = client.commit(batch).await.unwrap_err();
        assert!(err.to_string().contains("exceeds the commit limit"));
    }
}
