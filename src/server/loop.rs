// Server loop module
// Accepts connections until a shutdown is requested

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::Instant;

use super::connection::accept_connection;
use super::signal::SignalHandler;
use crate::config::AppState;
use crate::logger;

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Accept connections on `listener` until `signals` requests shutdown.
///
/// Must run inside a `LocalSet`; each connection is a local task. After
/// shutdown, open connections get up to the connection timeout to finish.
pub async fn run_server_loop(
    listener: TcpListener,
    state: Arc<AppState>,
    signals: Arc<SignalHandler>,
) {
    let active_connections = Arc::new(AtomicUsize::new(0));

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(stream, peer_addr, &state, &active_connections);
                    }
                    Err(e) => {
                        logger::log_error(&format!("Failed to accept connection: {e}"));
                    }
                }
            }

            () = signals.wait_for_shutdown() => {
                break;
            }
        }
    }

    drop(listener);

    let perf = &state.config.performance;
    let deadline = Instant::now()
        + Duration::from_secs(std::cmp::max(perf.read_timeout, perf.write_timeout));
    while active_connections.load(Ordering::SeqCst) > 0 && Instant::now() < deadline {
        tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
    }

    let remaining = active_connections.load(Ordering::SeqCst);
    if remaining > 0 {
        logger::log_warning(&format!(
            "Shutting down with {remaining} connection(s) still open"
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::server::create_reusable_listener;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn roundtrip(addr: std::net::SocketAddr, request: &str) -> String {
        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_serves_pages_until_shutdown() {
        let dir = tempfile::TempDir::new().unwrap();
        let state = Arc::new(AppState::new(&test_config(dir.path())).unwrap());
        let listener = create_reusable_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let signals = Arc::new(SignalHandler::new());

        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let server = tokio::task::spawn_local(run_server_loop(
                    listener,
                    Arc::clone(&state),
                    Arc::clone(&signals),
                ));

                let body = "body=over+the+wire";
                let save = roundtrip(
                    addr,
                    &format!(
                        "POST /save/Wire HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\
                         Content-Type: application/x-www-form-urlencoded\r\n\
                         Content-Length: {}\r\n\r\n{body}",
                        body.len()
                    ),
                )
                .await;
                assert!(save.starts_with("HTTP/1.1 302"), "{save}");
                assert!(save.contains("location: /view/Wire"), "{save}");

                let view = roundtrip(
                    addr,
                    "GET /view/Wire HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
                )
                .await;
                assert!(view.starts_with("HTTP/1.1 200"), "{view}");
                assert!(view.contains("over the wire"), "{view}");

                let missing = roundtrip(
                    addr,
                    "GET /view/No.Such HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
                )
                .await;
                assert!(missing.starts_with("HTTP/1.1 404"), "{missing}");

                signals.request_shutdown();
                tokio::time::timeout(Duration::from_secs(5), server)
                    .await
                    .unwrap()
                    .unwrap();
            })
            .await;
    }
}
