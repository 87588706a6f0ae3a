use tokio::signal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShutdownSignal {
    Interrupt,
    Terminate,
}

impl ShutdownSignal {
    fn as_str(self) -> &'static str {
        match self {
            ShutdownSignal::Interrupt => "SIGINT",
            ShutdownSignal::Terminate => "SIGTERM",
        }
    }
}

/// Resolves on Ctrl+C or SIGTERM. In-flight uploads are allowed to finish.
pub(crate) async fn shutdown_signal() {
    let received = wait_for_signal().await;
    tracing::info!(signal = received.as_str(), "Shutdown signal received; draining requests");
}

async fn wait_for_signal() -> ShutdownSignal {
    let interrupt = async {
        match signal::ctrl_c().await {
            Ok(()) => ShutdownSignal::Interrupt,
            Err(err) => {
                tracing::error!(error = %err, "Failed to listen for Ctrl+C");
                std::future::pending().await
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                ShutdownSignal::Terminate
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<ShutdownSignal>();

    tokio::select! {
        received = interrupt => received,
        received = terminate => received,
    }
}
