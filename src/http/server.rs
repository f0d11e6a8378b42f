//! HTTP server setup and the accept loop.
//!
//! # Responsibilities
//! - Assemble router, authenticator and dispatcher from config
//! - Accept connections and run one supervisor task per connection
//! - Coordinate graceful shutdown: stop accepting, stop reading, drain,
//!   then cancel what is left

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::net::TcpStream;
use tracing::Instrument;

use crate::auth::{Authenticator, CredentialValidator, StaticCredentials};
use crate::config::{AuthConfig, ServerConfig, StaticConfig};
use crate::dispatch::{DefaultHeaders, Dispatcher};
use crate::lifecycle::Shutdown;
use crate::net::connection::ConnectionTracker;
use crate::net::listener::{ConnectionPermit, Listener, ListenerError};
use crate::net::pool::WorkerPool;
use crate::net::supervisor::{supervise, ConnectionContext};
use crate::routing::{Endpoints, Router, StaticFiles, StaticResource, StaticResourceRegistry};

/// How long connections get to flush after the pool has been cancelled.
const FLUSH_AFTER_CANCEL: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("static resource {path}: {source}")]
    StaticResource {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Collects the application-supplied parts before the server is built.
pub struct HttpServerBuilder {
    config: ServerConfig,
    endpoints: Endpoints,
    statics: Option<Arc<dyn StaticResourceRegistry>>,
    validator: Option<Arc<dyn CredentialValidator>>,
}

impl HttpServerBuilder {
    pub fn endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Use this registry instead of the `statics` config section.
    pub fn statics(mut self, statics: Arc<dyn StaticResourceRegistry>) -> Self {
        self.statics = Some(statics);
        self
    }

    /// Use this validator instead of the `auth` config section.
    pub fn validator(mut self, validator: Arc<dyn CredentialValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn build(self) -> Result<HttpServer, ServerError> {
        let config = self.config;

        let statics = match self.statics {
            Some(statics) => Some(statics),
            None if config.statics.is_empty() => None,
            None => Some(Arc::new(load_statics(&config.statics)?) as Arc<dyn StaticResourceRegistry>),
        };
        let validator = self
            .validator
            .unwrap_or_else(|| Arc::new(credentials_from(&config.auth)) as Arc<dyn CredentialValidator>);

        let mut router = Router::new(Arc::new(self.endpoints));
        if let Some(statics) = statics {
            router = router.with_statics(statics);
        }

        let dispatcher = Dispatcher::new(
            router,
            Authenticator::new(validator, config.server.default_realm.clone()),
            DefaultHeaders::new(config.server.name.clone()),
            config.limits.max_content_length,
        );

        let context = ConnectionContext {
            dispatcher: Arc::new(dispatcher),
            pool: Arc::new(WorkerPool::new(config.listener.max_connections)),
            max_head_len: config.limits.max_header_section_len,
            idle_timeout: config.timeouts.idle(),
        };

        Ok(HttpServer {
            context: Arc::new(context),
            grace: config.timeouts.shutdown_grace(),
            tracker: ConnectionTracker::new(),
        })
    }
}

fn load_statics(entries: &[StaticConfig]) -> Result<StaticFiles, ServerError> {
    let mut files = StaticFiles::new();
    for entry in entries {
        let resource = StaticResource::from_file(&entry.location, entry.etag.clone()).map_err(
            |source| ServerError::StaticResource {
                path: entry.path.clone(),
                source,
            },
        )?;
        tracing::debug!(path = %entry.path, location = %entry.location, "Static resource registered");
        files.insert(entry.path.clone(), resource);
    }
    Ok(files)
}

fn credentials_from(auth: &AuthConfig) -> StaticCredentials {
    let users = auth
        .users
        .iter()
        .fold(StaticCredentials::new(), |creds, user| {
            creds.with_user(user.username.clone(), user.password.clone())
        });
    auth.tokens.iter().fold(users, |creds, token| {
        creds.with_token(token.token.clone(), token.principal.clone())
    })
}

/// The HTTP/1.1 server.
pub struct HttpServer {
    context: Arc<ConnectionContext>,
    grace: Duration,
    tracker: ConnectionTracker,
}

impl HttpServer {
    pub fn builder(config: ServerConfig) -> HttpServerBuilder {
        HttpServerBuilder {
            config,
            endpoints: Endpoints::new(),
            statics: None,
            validator: None,
        }
    }

    /// Number of connections currently being supervised.
    pub fn active_connections(&self) -> u64 {
        self.tracker.active_count()
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` resolves.
    pub async fn run<F>(self, listener: Listener, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        let addr = listener.local_addr().map_err(ListenerError::Bind)?;
        tracing::info!(
            address = %addr,
            max_connections = listener.max_connections(),
            workers = self.context.pool.size(),
            "HTTP server starting"
        );

        let stop = Shutdown::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => self.spawn_connection(stream, peer, permit, &stop),
                    Err(ListenerError::Accept(e)) => {
                        tracing::warn!(error = %e, "Accept failed");
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                    Err(e) => return Err(e.into()),
                },
            }
        }

        listener.close();
        drop(listener);
        self.drain(&stop).await;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    fn spawn_connection(&self, stream: TcpStream, peer: SocketAddr, permit: ConnectionPermit, stop: &Shutdown) {
        let guard = self.tracker.track();
        let span = tracing::info_span!("connection", id = %guard.id(), peer = %peer);
        let context = Arc::clone(&self.context);
        let stop = stop.subscribe();

        tokio::spawn(
            async move {
                let _permit = permit;
                let _guard = guard;
                if let Err(e) = stream.set_nodelay(true) {
                    tracing::debug!(error = %e, "Failed to set TCP_NODELAY");
                }
                supervise(stream, context, stop).await;
            }
            .instrument(span),
        );
    }

    async fn drain(&self, stop: &Shutdown) {
        let deadline = Instant::now() + self.grace;
        tracing::info!(
            connections = self.tracker.active_count(),
            subscribers = stop.receiver_count(),
            in_flight = self.context.pool.in_flight(),
            grace_secs = self.grace.as_secs(),
            "Draining connections"
        );
        stop.trigger();

        if self.tracker.wait_for_idle(self.grace).await {
            self.context.pool.shutdown(Duration::ZERO).await;
            return;
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        self.context.pool.shutdown(remaining).await;
        if !self.tracker.wait_for_idle(FLUSH_AFTER_CANCEL).await {
            tracing::warn!(
                connections = self.tracker.active_count(),
                "Connections still open after shutdown"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{TokenConfig, UserConfig};

    #[test]
    fn credentials_come_from_config() {
        use crate::auth::Credentials;

        let auth = AuthConfig {
            users: vec![UserConfig {
                username: "alice".into(),
                password: "pw".into(),
            }],
            tokens: vec![TokenConfig {
                token: "t0k".into(),
                principal: "ci".into(),
            }],
        };
        let creds = credentials_from(&auth);

        let basic = Credentials::Basic {
            username: "alice".into(),
            password: "pw".into(),
        };
        assert_eq!(creds.validate(&basic).unwrap().name(), "alice");

        let bearer = Credentials::Bearer { token: "t0k".into() };
        assert_eq!(creds.validate(&bearer).unwrap().name(), "ci");
    }

    #[test]
    fn missing_static_file_fails_build() {
        let mut config = ServerConfig::default();
        config.statics.push(StaticConfig {
            path: "/gone".into(),
            location: "/no/such/file".into(),
            etag: None,
        });
        let err = HttpServer::builder(config).build().err().unwrap();
        assert!(matches!(err, ServerError::StaticResource { ref path, .. } if path == "/gone"));
    }

    #[tokio::test]
    async fn stops_on_shutdown() {
        let tcp = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let listener = Listener::from_tcp(tcp, 4).unwrap();
        let server = HttpServer::builder(ServerConfig::default()).build().unwrap();

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            server.run(listener, async {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }),
        )
        .await
        .unwrap();
        assert!(result.is_ok());
    }
}
