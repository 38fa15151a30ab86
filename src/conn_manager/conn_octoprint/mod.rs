pub mod octo_types;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::printer_config::{PrinterProtocol, PrinterTarget};
use crate::status::{PrinterState, PrinterStatusReport};

use super::backend::ProtocolBackend;
use super::command::PrinterFileRecord;
use super::printer_error::PrinterError;

use octo_types::{ApiVersion, FileList, PrinterStatus};

/// Backend for OctoPrint-compatible HTTP/REST firmwares, default port 80.
/// The API key rides on every request as `X-Api-Key`; the pooled
/// `reqwest::Client` is the connection reuse for this protocol family.
pub struct OctoClient {
    client: reqwest::Client,
}

impl OctoClient {
    const URL_VERSION: &'static str = "api/version";
    const URL_PRINTER: &'static str = "api/printer";
    const URL_FILES: &'static str = "api/files/local";

    pub fn new() -> Result<Self, PrinterError> {
        let client = reqwest::ClientBuilder::new()
            .build()
            .map_err(|e| PrinterError::TransportFailure(e.to_string()))?;
        Ok(Self { client })
    }

    fn url(target: &PrinterTarget, path: &str) -> String {
        format!("http://{}:{}/{}", target.address, target.port, path)
    }

    fn api_key(target: &PrinterTarget) -> &str {
        target.api_key.as_deref().unwrap_or("")
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        target: &PrinterTarget,
        path: &str,
    ) -> Result<T, PrinterError> {
        let url = Self::url(target, path);
        let res = self
            .client
            .get(&url)
            .header("X-Api-Key", Self::api_key(target))
            .send()
            .await
            .map_err(request_error)?;
        let res = check_status(res, target, None)?;
        res.json().await.map_err(|e| {
            PrinterError::ProtocolError(format!("invalid json from {}: {}", url, e))
        })
    }
}

fn request_error(e: reqwest::Error) -> PrinterError {
    PrinterError::TransportFailure(e.to_string())
}

fn check_status(
    res: reqwest::Response,
    target: &PrinterTarget,
    filename: Option<&str>,
) -> Result<reqwest::Response, PrinterError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    warn!("status {:#?}", status);
    Err(map_status(status, target, filename))
}

/// 4xx is an application rejection, 5xx a transport-class failure eligible
/// for the client's single retry.
fn map_status(
    status: StatusCode,
    target: &PrinterTarget,
    filename: Option<&str>,
) -> PrinterError {
    match status.as_u16() {
        401 => {
            if OctoClient::api_key(target).is_empty() {
                PrinterError::AuthRequired
            } else {
                PrinterError::AuthRejected
            }
        }
        403 => PrinterError::AuthRejected,
        404 => PrinterError::NotFound(filename.unwrap_or("(endpoint)").to_string()),
        409 => PrinterError::DeviceBusy,
        500..=599 => PrinterError::TransportFailure(format!("server error {}", status)),
        _ => PrinterError::ProtocolError(format!("unexpected status {}", status)),
    }
}

#[async_trait]
impl ProtocolBackend for OctoClient {
    fn protocol(&self) -> PrinterProtocol {
        PrinterProtocol::Octoprint
    }

    async fn handshake(&self, target: &PrinterTarget) -> Result<(), PrinterError> {
        let version: ApiVersion = self.get_json(target, Self::URL_VERSION).await?;
        debug!("octoprint {} (api {}) answered", version.server, version.api);
        Ok(())
    }

    async fn query_status(
        &self,
        target: &PrinterTarget,
    ) -> Result<PrinterStatusReport, PrinterError> {
        let status: PrinterStatus = self.get_json(target, Self::URL_PRINTER).await?;

        let flags = status.state.flags;
        let state = if flags.printing {
            PrinterState::Printing
        } else if flags.paused {
            PrinterState::Paused
        } else if flags.error {
            PrinterState::Error
        } else if flags.operational {
            PrinterState::Idle
        } else {
            PrinterState::Busy
        };

        Ok(PrinterStatusReport {
            state,
            model: None,
            current_file: None,
            progress: None,
        })
    }

    async fn list_files(
        &self,
        target: &PrinterTarget,
    ) -> Result<Vec<PrinterFileRecord>, PrinterError> {
        let listing: FileList = self.get_json(target, Self::URL_FILES).await?;

        Ok(listing
            .files
            .into_iter()
            .map(|f| PrinterFileRecord {
                filename: f.name,
                size: f.size,
                modified: f
                    .date
                    .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0)),
            })
            .collect())
    }

    async fn start_print(
        &self,
        target: &PrinterTarget,
        filename: &str,
    ) -> Result<(), PrinterError> {
        let url = Self::url(target, &format!("{}/{}", Self::URL_FILES, filename));
        let body = serde_json::json!({ "command": "select", "print": true });

        debug!("sending print command: {:#?}", body);

        let res = self
            .client
            .post(&url)
            .header("X-Api-Key", Self::api_key(target))
            .json(&body)
            .send()
            .await
            .map_err(request_error)?;
        check_status(res, target, Some(filename))?;
        Ok(())
    }

    async fn delete_file(
        &self,
        target: &PrinterTarget,
        filename: &str,
    ) -> Result<(), PrinterError> {
        let url = Self::url(target, &format!("{}/{}", Self::URL_FILES, filename));
        let res = self
            .client
            .delete(&url)
            .header("X-Api-Key", Self::api_key(target))
            .send()
            .await
            .map_err(request_error)?;
        check_status(res, target, Some(filename))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conn_manager::test_support::{http_stub, target};

    const VERSION_BODY: &str = r#"{"api":"0.1","server":"1.10.0","text":"OctoPrint 1.10.0"}"#;

    fn octo_target(addr: std::net::SocketAddr, key: &str) -> PrinterTarget {
        target(PrinterProtocol::Octoprint, addr, Some(key))
    }

    #[tokio::test]
    async fn handshake_parses_the_version_reply() {
        let stub = http_stub(vec![(200, VERSION_BODY.to_string())]).await;
        let client = OctoClient::new().unwrap();

        client.handshake(&octo_target(stub.addr, "secret")).await.unwrap();

        let requests = stub.requests.lock().unwrap();
        assert!(requests[0].starts_with("GET /api/version"));
        assert!(requests[0].to_lowercase().contains("x-api-key: secret"));
    }

    #[tokio::test]
    async fn handshake_rejects_an_unparseable_body() {
        let stub = http_stub(vec![(200, "not json".to_string())]).await;
        let client = OctoClient::new().unwrap();

        let res = client.handshake(&octo_target(stub.addr, "secret")).await;
        assert!(matches!(res, Err(PrinterError::ProtocolError(_))));
    }

    #[tokio::test]
    async fn bad_key_is_auth_rejected() {
        let stub = http_stub(vec![(401, "{}".to_string())]).await;
        let client = OctoClient::new().unwrap();

        let res = client.list_files(&octo_target(stub.addr, "bad")).await;
        assert_eq!(res, Err(PrinterError::AuthRejected));
    }

    #[tokio::test]
    async fn missing_key_is_auth_required() {
        // direct backend call; the client would have rejected the target
        // before any I/O
        let stub = http_stub(vec![(401, "{}".to_string())]).await;
        let client = OctoClient::new().unwrap();

        let keyless = target(PrinterProtocol::Octoprint, stub.addr, None);
        let res = client.list_files(&keyless).await;
        assert_eq!(res, Err(PrinterError::AuthRequired));
    }

    #[tokio::test]
    async fn client_retries_a_server_error_once() {
        use crate::conn_manager::test_support::fast_policy;
        use crate::conn_manager::PrinterClient;

        let stub = http_stub(vec![
            (500, "{}".to_string()),
            (200, r#"{"files":[{"name":"Benchy.gcode"}]}"#.to_string()),
        ])
        .await;
        let client = PrinterClient::with_policy(fast_policy()).unwrap();

        let files = client
            .list_files(&octo_target(stub.addr, "key"))
            .await
            .unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(stub.requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn forbidden_is_auth_rejected() {
        let stub = http_stub(vec![(403, "{}".to_string())]).await;
        let client = OctoClient::new().unwrap();

        let res = client.delete_file(&octo_target(stub.addr, "key"), "a.gcode").await;
        assert_eq!(res, Err(PrinterError::AuthRejected));
    }

    #[tokio::test]
    async fn listing_tolerates_missing_optional_fields() {
        let body = r#"{"files":[
            {"name":"Benchy.gcode","size":714003,"date":1716800000},
            {"name":"bare.gcode"}
        ],"free":123456789}"#;
        let stub = http_stub(vec![(200, body.to_string())]).await;
        let client = OctoClient::new().unwrap();

        let files = client.list_files(&octo_target(stub.addr, "key")).await.unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].filename, "Benchy.gcode");
        assert_eq!(files[0].size, Some(714003));
        assert!(files[0].modified.is_some());
        assert_eq!(files[1].size, None);
        assert!(files[1].modified.is_none());
    }

    #[tokio::test]
    async fn empty_printer_lists_no_files() {
        let stub = http_stub(vec![(200, r#"{"files":[]}"#.to_string())]).await;
        let client = OctoClient::new().unwrap();

        let files = client.list_files(&octo_target(stub.addr, "key")).await.unwrap();
        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn start_print_posts_a_select_command() {
        let stub = http_stub(vec![(204, String::new())]).await;
        let client = OctoClient::new().unwrap();

        client
            .start_print(&octo_target(stub.addr, "key"), "Benchy.gcode")
            .await
            .unwrap();

        let requests = stub.requests.lock().unwrap();
        assert!(requests[0].starts_with("POST /api/files/local/Benchy.gcode"));
        assert!(requests[0].contains(r#""command":"select""#));
        assert!(requests[0].contains(r#""print":true"#));
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let stub = http_stub(vec![(404, "{}".to_string())]).await;
        let client = OctoClient::new().unwrap();

        let res = client
            .start_print(&octo_target(stub.addr, "key"), "gone.gcode")
            .await;
        assert_eq!(res, Err(PrinterError::NotFound("gone.gcode".to_string())));
    }

    #[tokio::test]
    async fn conflict_is_device_busy() {
        let stub = http_stub(vec![(409, "{}".to_string())]).await;
        let client = OctoClient::new().unwrap();

        let res = client
            .start_print(&octo_target(stub.addr, "key"), "Benchy.gcode")
            .await;
        assert_eq!(res, Err(PrinterError::DeviceBusy));
    }

    #[tokio::test]
    async fn delete_uses_the_file_endpoint() {
        let stub = http_stub(vec![(204, String::new())]).await;
        let client = OctoClient::new().unwrap();

        client
            .delete_file(&octo_target(stub.addr, "key"), "cube.gcode")
            .await
            .unwrap();

        let requests = stub.requests.lock().unwrap();
        assert!(requests[0].starts_with("DELETE /api/files/local/cube.gcode"));
    }

    #[tokio::test]
    async fn server_errors_map_to_transport_failures() {
        let stub = http_stub(vec![(500, "{}".to_string())]).await;
        let client = OctoClient::new().unwrap();

        let res = client.list_files(&octo_target(stub.addr, "key")).await;
        assert!(matches!(res, Err(PrinterError::TransportFailure(_))));
    }

    #[tokio::test]
    async fn status_flags_map_to_printer_state() {
        let body = r#"{"state":{"text":"Printing","flags":{"operational":true,"printing":true,"paused":false,"error":false}}}"#;
        let stub = http_stub(vec![(200, body.to_string())]).await;
        let client = OctoClient::new().unwrap();

        let report = client.query_status(&octo_target(stub.addr, "key")).await.unwrap();
        assert_eq!(report.state, PrinterState::Printing);
    }
}
