// src/main.rs
use anyhow::Result;
use health_report::{
    config::{self, Config},
    health::{Deferred, Report},
    metrics::MetricsRegistry,
    probes::HttpProbe,
    server::{HealthCheckHandler, ServerBuilder},
};
use hyper::{Body, Request, Response, Server, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("health_report=debug".parse()?)
                .add_directive("hyper=info".parse()?),
        )
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.yaml".to_string());

    info!("Loading configuration from: {}", config_path);
    let config = config::load_config(&config_path).await?;

    // Probes are built once; each request lifts a copy into a fresh report.
    let template = build_template(&config)?;
    info!("Configured {} probes", template.len());

    let mut handler = HealthCheckHandler::new(move || template.clone().lift::<Deferred>())
        .with_path(&config.server.path);

    if config.metrics.enabled {
        let registry = MetricsRegistry::new()?;
        handler = handler.with_metrics(registry.collector());

        let metrics_addr: SocketAddr = ([0, 0, 0, 0], config.metrics.port).into();
        start_metrics_server(metrics_addr, registry, config.metrics.path.clone()).await?;
    }

    info!(
        "Serving health checks on http://{}{}",
        config.server.bind_addr, config.server.path
    );

    ServerBuilder::new(config.server.bind_addr)
        .with_handler(handler)
        .serve_with_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn build_template(config: &Config) -> Result<Report<Arc<HttpProbe>>> {
    let mut elements = Vec::with_capacity(config.probes.len());
    for probe in &config.probes {
        let element = HttpProbe::new(&probe.name, probe.url.clone(), probe.timeout())?
            .into_element(probe.metadata.clone())?;
        elements.push(element);
    }
    Ok(Report::from_elements(elements)?)
}

async fn start_metrics_server(
    addr: SocketAddr,
    registry: MetricsRegistry,
    path: String,
) -> Result<()> {
    let registry = Arc::new(registry);
    let metrics_path = Arc::new(path);
    let service_path = metrics_path.clone();

    let make_service = hyper::service::make_service_fn(move |_| {
        let registry = registry.clone();
        let path = service_path.clone();

        async move {
            Ok::<_, Infallible>(hyper::service::service_fn(move |req: Request<Body>| {
                let registry = registry.clone();
                let path = path.clone();

                async move {
                    if req.uri().path() != path.as_str() {
                        return Ok::<_, Infallible>(plain(StatusCode::NOT_FOUND, "Not Found"));
                    }

                    match registry.gather() {
                        Ok(metrics) => {
                            let mut response = Response::new(Body::from(metrics));
                            response.headers_mut().insert(
                                hyper::header::CONTENT_TYPE,
                                hyper::header::HeaderValue::from_static(
                                    "text/plain; version=0.0.4",
                                ),
                            );
                            Ok(response)
                        }
                        Err(e) => {
                            error!("Failed to encode metrics: {}", e);
                            Ok(plain(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error"))
                        }
                    }
                }
            }))
        }
    });

    let server = Server::try_bind(&addr)?.serve(make_service);

    info!(
        "Metrics server listening on http://{}{}",
        addr,
        metrics_path.as_str()
    );

    tokio::spawn(async move {
        if let Err(e) = server.await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(())
}

fn plain(status: StatusCode, body: &'static str) -> Response<Body> {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response
}

// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
