// ============================================================================
// SAVE TO SERVER - client side of POST /api/save_project
// ============================================================================

use serde::{Deserialize, Serialize};
use std::sync::mpsc;
use std::time::Duration;

use crate::ops::filters::FilterSettings;

/// Path appended to the configured server URL.
pub const SAVE_ENDPOINT: &str = "/api/save_project";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Project body nested under `project_data`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectData {
    /// PNG data URL of the rendered view
    pub image: String,
    pub filters: FilterSettings,
    /// Number of history entries at save time
    pub history: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SaveRequest {
    /// Server id of a previously saved project; present to overwrite it
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub project_id: Option<i64>,
    pub title: String,
    pub description: String,
    pub width: u32,
    pub height: u32,
    pub project_data: ProjectData,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct SaveResponse {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub project_id: Option<i64>,
}

#[derive(Debug)]
pub enum SaveError {
    /// Connection, DNS, timeout …
    Http(String),
    /// Non-2xx status code
    Status(u16),
    /// Response body was not the expected JSON
    Json(String),
    /// `success: false`, with the server's message
    Server(String),
    /// Redirected to the login page (or 401)
    NotLoggedIn,
}

impl std::fmt::Display for SaveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SaveError::Http(e) => write!(f, "Could not reach the server: {}", e),
            SaveError::Status(code) => write!(f, "Server answered with HTTP {}", code),
            SaveError::Json(e) => write!(f, "Unexpected server response: {}", e),
            SaveError::Server(msg) => write!(f, "Save failed: {}", msg),
            SaveError::NotLoggedIn => write!(
                f,
                "The server requires a login. Sign in through the web editor, then save again."
            ),
        }
    }
}

impl std::error::Error for SaveError {}

impl From<reqwest::Error> for SaveError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            SaveError::Json(e.to_string())
        } else {
            SaveError::Http(e.to_string())
        }
    }
}

/// Full endpoint URL for a configured base URL.
pub fn save_url(server_url: &str) -> String {
    format!("{}{}", server_url.trim_end_matches('/'), SAVE_ENDPOINT)
}

/// Turn a parsed response into the saved project id.
pub fn interpret_response(response: SaveResponse) -> Result<Option<i64>, SaveError> {
    if response.success {
        Ok(response.project_id)
    } else {
        Err(SaveError::Server(
            response.error.unwrap_or_else(|| "unknown error".to_string()),
        ))
    }
}

/// Map an HTTP answer to the saved project id.
///
/// The endpoint sits behind a login: an anonymous request is redirected
/// to the login page, which is HTML rather than JSON.
pub fn classify_response(status: u16, body: &str) -> Result<Option<i64>, SaveError> {
    if status == 401 || (300..400).contains(&status) {
        return Err(SaveError::NotLoggedIn);
    }
    if !(200..300).contains(&status) {
        return Err(SaveError::Status(status));
    }
    match serde_json::from_str::<SaveResponse>(body) {
        Ok(parsed) => interpret_response(parsed),
        Err(_) if body.trim_start().starts_with('<') => Err(SaveError::NotLoggedIn),
        Err(e) => Err(SaveError::Json(e.to_string())),
    }
}

/// Send the request and wait for the answer.
pub fn save_project_blocking(server_url: &str, request: &SaveRequest) -> Result<Option<i64>, SaveError> {
    let url = save_url(server_url);
    crate::log_info!(
        "Saving \"{}\" ({}x{}) to {}",
        request.title,
        request.width,
        request.height,
        url
    );

    // A followed login redirect would hide the real status
    let client = reqwest::blocking::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .redirect(reqwest::redirect::Policy::none())
        .build()?;
    let response = client.post(&url).json(request).send()?;

    let status = response.status().as_u16();
    let body = response.text()?;
    classify_response(status, &body)
}

/// Run the save on a worker thread.  The UI polls the receiver every frame.
pub fn spawn_save(server_url: String, request: SaveRequest) -> mpsc::Receiver<Result<Option<i64>, SaveError>> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let result = save_project_blocking(&server_url, &request);
        match &result {
            Ok(id) => {
                crate::log_info!("Save finished (project id {:?})", id);
            }
            Err(e) => {
                crate::log_err!("Save failed: {}", e);
            }
        }
        let _ = tx.send(result);
    });
    rx
}
