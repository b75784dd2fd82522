use anyhow::Context;
use ndf_search::{api, config, logging, search::SearchService};
use std::io;
use std::net::Ipv4Addr;
use std::ops::RangeInclusive;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Ports tried in order when `SERVER_PORT` is unset.
const FALLBACK_PORTS: RangeInclusive<u16> = 4100..=4199;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::init_config().context("Invalid configuration")?;
    logging::init_tracing("ndf-search");
    let config = config::get_config();
    config.log_summary();

    let service = SearchService::connect(config)
        .await
        .with_context(|| format!("OpenSearch unreachable at {}", config.opensearch_url))?;
    let app = api::create_router(Arc::new(service));

    let (listener, port) = bind_listener(config.server_port, FALLBACK_PORTS)
        .await
        .context("Failed to bind listener")?;
    tracing::info!(doc_root = %config.doc_root.display(), "Search API listening on http://0.0.0.0:{port}");
    axum::serve(listener, app).await.context("HTTP server failed")?;
    Ok(())
}

/// Bind the configured port, or the first free port of `fallback` when none is configured.
///
/// An explicit port is never substituted: if it is taken the error is returned as is.
async fn bind_listener(
    configured: Option<u16>,
    fallback: RangeInclusive<u16>,
) -> io::Result<(TcpListener, u16)> {
    if let Some(port) = configured {
        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await?;
        let bound = listener.local_addr()?.port();
        return Ok((listener, bound));
    }

    let (first, last) = (*fallback.start(), *fallback.end());
    for port in fallback {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => return Ok((listener, port)),
            Err(err) if err.kind() == io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Search API port taken; trying next");
            }
            Err(err) => return Err(err),
        }
    }
    Err(io::Error::new(
        io::ErrorKind::AddrNotAvailable,
        format!("SERVER_PORT unset and ports {first}-{last} are all in use"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn configured_port_is_used_verbatim() {
        let (_listener, port) = bind_listener(Some(0), FALLBACK_PORTS)
            .await
            .expect("ephemeral bind");
        assert_ne!(port, 0);
    }

    #[tokio::test]
    async fn taken_configured_port_is_an_error() {
        let held = std::net::TcpListener::bind((Ipv4Addr::UNSPECIFIED, 0)).expect("hold port");
        let port = held.local_addr().expect("addr").port();

        let err = bind_listener(Some(port), FALLBACK_PORTS)
            .await
            .expect_err("port is held");
        assert_eq!(err.kind(), io::ErrorKind::AddrInUse);
    }

    #[tokio::test]
    async fn fallback_skips_taken_ports() {
        let held = std::net::TcpListener::bind((Ipv4Addr::UNSPECIFIED, 0)).expect("hold port");
        let taken = held.local_addr().expect("addr").port();
        let range = taken..=taken.saturating_add(20);

        let (_listener, port) = bind_listener(None, range).await.expect("fallback bind");
        assert!(port > taken);
    }

    #[tokio::test]
    async fn exhausted_fallback_names_the_range() {
        let held = std::net::TcpListener::bind((Ipv4Addr::UNSPECIFIED, 0)).expect("hold port");
        let taken = held.local_addr().expect("addr").port();

        let err = bind_listener(None, taken..=taken)
            .await
            .expect_err("only port is held");
        assert_eq!(err.kind(), io::ErrorKind::AddrNotAvailable);
        assert!(err.to_string().contains(&format!("{taken}-{taken}")));
    }
}
