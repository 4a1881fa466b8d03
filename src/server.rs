//! TCP accept loop.

use crate::commands::ExecutorHandle;
use crate::connection::{handle_connection, ConnectionStats};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error};

/// Accepts connections forever, spawning one session task per client.
///
/// Accept failures are logged and the loop keeps going.
pub async fn serve(listener: TcpListener, executor: ExecutorHandle, stats: Arc<ConnectionStats>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                debug!(client = %addr, "Accepted connection");
                let executor = executor.clone();
                let stats = Arc::clone(&stats);
                tokio::spawn(handle_connection(stream, addr, executor, stats));
            }
            Err(e) => {
                error!(error = %e, "Failed to accept connection");
            }
        }
    }
}
