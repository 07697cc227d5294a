//! HTTP server for feedstore.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use super::handlers::AppState;
use super::router::create_router;

/// HTTP server over the application state.
pub struct ApiServer {
    addr: SocketAddr,
    state: Arc<AppState>,
}

impl ApiServer {
    /// Create a server bound to the configured host and port.
    pub fn new(state: Arc<AppState>) -> Self {
        let addr = format!(
            "{}:{}",
            state.config.server.host, state.config.server.port
        )
        .parse()
        .expect("Invalid server address");

        Self { addr, state }
    }

    /// The configured bind address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Run the server until it fails or is aborted.
    pub async fn run(self) -> Result<(), std::io::Error> {
        let router = create_router(self.state);

        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;

        tracing::info!("Server listening on http://{}", local_addr);

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
    }

    /// Run the server in the background and return the bound address.
    ///
    /// Useful for tests binding port 0.
    pub async fn run_with_addr(self) -> Result<SocketAddr, std::io::Error> {
        let router = create_router(self.state);

        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;

        tracing::info!("Server listening on http://{}", local_addr);

        tokio::spawn(async move {
            if let Err(e) = axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            {
                tracing::error!("Server error: {}", e);
            }
        });

        Ok(local_addr)
    }
}
