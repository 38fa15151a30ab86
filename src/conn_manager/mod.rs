pub mod backend;
pub mod command;
pub mod conn_act;
pub mod conn_anycubic;
pub(crate) mod conn_cache;
pub mod conn_octoprint;
pub mod printer_error;

#[cfg(test)]
pub(crate) mod test_support;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::printer_config::{PrinterProtocol, PrinterTarget};
use crate::status::PrinterStatusReport;

use backend::ProtocolBackend;
use command::{CommandResult, ConnectionTestResult, PrinterCommand, PrinterFileRecord};
use printer_error::PrinterError;

/// Per-command budgets and the backoff before the single transport retry.
/// Each budget covers the whole command including that retry.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientPolicy {
    pub test_timeout: Duration,
    pub status_timeout: Duration,
    pub list_timeout: Duration,
    pub start_timeout: Duration,
    pub delete_timeout: Duration,
    pub retry_backoff: Duration,
}

impl Default for ClientPolicy {
    fn default() -> Self {
        Self {
            test_timeout: Duration::from_secs(5),
            status_timeout: Duration::from_secs(5),
            list_timeout: Duration::from_secs(10),
            start_timeout: Duration::from_secs(10),
            delete_timeout: Duration::from_secs(10),
            retry_backoff: Duration::from_millis(500),
        }
    }
}

/// The single entry point for talking to printers.
///
/// Holds one backend per protocol and dispatches each command to the
/// backend matching the target's protocol. Stateless between calls apart
/// from connection reuse inside the backends; commands against different
/// targets, or even the same target, run concurrently without any
/// serialization here. Construct once at startup and hand out references.
///
/// Dropping a command future cancels it: the underlying socket or request
/// is closed promptly. A cancelled `start_print` whose request already hit
/// the wire may still take effect on the device; that is a limitation of
/// the printers, not something this layer can undo.
pub struct PrinterClient {
    backends: HashMap<PrinterProtocol, Arc<dyn ProtocolBackend>>,
    policy: ClientPolicy,
}

impl PrinterClient {
    pub fn new() -> Result<Self, PrinterError> {
        Self::with_policy(ClientPolicy::default())
    }

    pub fn with_policy(policy: ClientPolicy) -> Result<Self, PrinterError> {
        let mut client = Self::empty(policy);
        client.insert_backend(Arc::new(conn_act::ActClient::new()));
        client.insert_backend(Arc::new(conn_octoprint::OctoClient::new()?));
        client.insert_backend(Arc::new(conn_anycubic::AnycubicClient::new()?));
        Ok(client)
    }

    /// A registry with no backends; callers insert their own.
    pub fn empty(policy: ClientPolicy) -> Self {
        Self {
            backends: HashMap::new(),
            policy,
        }
    }

    pub fn insert_backend(&mut self, backend: Arc<dyn ProtocolBackend>) {
        self.backends.insert(backend.protocol(), backend);
    }

    fn backend_for(
        &self,
        protocol: PrinterProtocol,
        command: &str,
    ) -> Result<&Arc<dyn ProtocolBackend>, PrinterError> {
        self.backends
            .get(&protocol)
            .ok_or_else(|| PrinterError::Unsupported {
                protocol,
                command: command.to_string(),
            })
    }

    fn check_filename(filename: &str) -> Result<(), PrinterError> {
        if filename.trim().is_empty() {
            return Err(PrinterError::InvalidTarget(
                "filename must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Overall budget around one attempt plus at most one silent retry for
    /// transport-class failures. Application rejections pass straight
    /// through; retrying those cannot succeed.
    async fn execute<T, Fut>(
        &self,
        budget: Duration,
        mut call: impl FnMut() -> Fut,
    ) -> Result<T, PrinterError>
    where
        Fut: Future<Output = Result<T, PrinterError>>,
    {
        let attempt = async {
            match call().await {
                Err(e) if e.is_retryable() => {
                    debug!("transport failure, retrying once: {}", e);
                    tokio::time::sleep(self.policy.retry_backoff).await;
                    call().await
                }
                other => other,
            }
        };

        match tokio::time::timeout(budget, attempt).await {
            Ok(res) => res,
            Err(_) => {
                warn!("command timed out after {:?}", budget);
                Err(PrinterError::Timeout(budget))
            }
        }
    }
}

/// commands
impl PrinterClient {
    pub async fn send_command(
        &self,
        target: &PrinterTarget,
        cmd: PrinterCommand,
    ) -> Result<CommandResult, PrinterError> {
        match cmd {
            PrinterCommand::TestConnection => self
                .test_connection(target)
                .await
                .map(CommandResult::ConnectionTest),
            PrinterCommand::ListFiles => self
                .list_files(target)
                .await
                .map(CommandResult::FileListing),
            PrinterCommand::StartPrint { filename } => self
                .start_print(target, &filename)
                .await
                .map(|_| CommandResult::PrintStarted),
            PrinterCommand::DeleteFile { filename } => self
                .delete_file(target, &filename)
                .await
                .map(|_| CommandResult::FileDeleted),
            PrinterCommand::QueryStatus => {
                self.query_status(target).await.map(CommandResult::Status)
            }
        }
    }

    /// Reachability probe. An offline, misbehaving or slow printer is
    /// reported as `reachable: false` with the underlying failure attached;
    /// only a malformed target or an unregistered protocol is an `Err`.
    pub async fn test_connection(
        &self,
        target: &PrinterTarget,
    ) -> Result<ConnectionTestResult, PrinterError> {
        target.validate()?;
        let backend = self.backend_for(target.protocol, "test_connection")?;

        match self
            .execute(self.policy.test_timeout, || backend.handshake(target))
            .await
        {
            Ok(()) => Ok(ConnectionTestResult {
                reachable: true,
                error: None,
            }),
            Err(e) => {
                debug!("connection test failed for {}: {}", target.host_port(), e);
                Ok(ConnectionTestResult {
                    reachable: false,
                    error: Some(e),
                })
            }
        }
    }

    pub async fn query_status(
        &self,
        target: &PrinterTarget,
    ) -> Result<PrinterStatusReport, PrinterError> {
        target.validate()?;
        let backend = self.backend_for(target.protocol, "query_status")?;
        self.execute(self.policy.status_timeout, || backend.query_status(target))
            .await
    }

    /// Unordered; callers sort for display.
    pub async fn list_files(
        &self,
        target: &PrinterTarget,
    ) -> Result<Vec<PrinterFileRecord>, PrinterError> {
        target.validate()?;
        let backend = self.backend_for(target.protocol, "list_files")?;
        self.execute(self.policy.list_timeout, || backend.list_files(target))
            .await
    }

    pub async fn start_print(
        &self,
        target: &PrinterTarget,
        filename: &str,
    ) -> Result<(), PrinterError> {
        target.validate()?;
        Self::check_filename(filename)?;
        let backend = self.backend_for(target.protocol, "start_print")?;
        self.execute(self.policy.start_timeout, || {
            backend.start_print(target, filename)
        })
        .await
    }

    /// Not idempotent by design: deleting an already-deleted file surfaces
    /// `NotFound`, which is how file-browser callers detect a stale listing.
    pub async fn delete_file(
        &self,
        target: &PrinterTarget,
        filename: &str,
    ) -> Result<(), PrinterError> {
        target.validate()?;
        Self::check_filename(filename)?;
        let backend = self.backend_for(target.protocol, "delete_file")?;
        self.execute(self.policy.delete_timeout, || {
            backend.delete_file(target, filename)
        })
        .await
    }
}
