use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use rand::RngCore;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::auth::UserDirectory;
use crate::config::ServerConfig;
use crate::metar::MetarService;
use crate::post_office::{Mail, MailKind, PostOffice};
use crate::session::connection::Connection;
use crate::session::login::{self, LoginError};
use crate::session::{event_loop, Session};
use crate::wire::pdu::Delete;
use crate::wire::SERVER_CALLSIGN;

/// Everything a connection task needs, shared behind one Arc.
pub struct ServerState {
    pub config: ServerConfig,
    pub post_office: PostOffice<Session>,
    pub metar: MetarService<Session>,
    pub directory: Arc<dyn UserDirectory>,
    pub jwt_secret: Vec<u8>,
    pub motd: Vec<String>,
    pub shutdown: CancellationToken,
}

pub struct Server {
    state: Arc<ServerState>,
    listeners: Vec<TcpListener>,
    admin_listener: TcpListener,
}

impl Server {
    pub async fn bind(mut config: ServerConfig, directory: Arc<dyn UserDirectory>) -> Result<Self> {
        if let Some(ref path) = config.motd_file {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading MOTD file {path}"))?;
            config.motd = Some(content);
        }
        let motd: Vec<String> = config
            .motd
            .as_deref()
            .unwrap_or_default()
            .lines()
            .map(str::to_owned)
            .filter(|line| !line.is_empty())
            .collect();

        let jwt_secret = match config.jwt_secret {
            Some(ref secret) => secret.as_bytes().to_vec(),
            None => {
                // Tokens minted elsewhere cannot match a random secret, so
                // only password logins will work until one is configured.
                warn!("no JWT secret configured, generating a random one");
                let mut secret = vec![0u8; 32];
                rand::thread_rng().fill_bytes(&mut secret);
                secret
            }
        };

        let shutdown = CancellationToken::new();
        let metar = MetarService::spawn(config.metar_workers, shutdown.child_token())?;

        let mut listeners = Vec::with_capacity(config.listen.len());
        for addr in &config.listen {
            let listener = TcpListener::bind(addr)
                .await
                .with_context(|| format!("binding client listener {addr}"))?;
            info!("client listener on {}", listener.local_addr()?);
            listeners.push(listener);
        }
        let admin_listener = TcpListener::bind(&config.admin_listen)
            .await
            .with_context(|| format!("binding admin listener {}", config.admin_listen))?;
        info!("admin listener on {}", admin_listener.local_addr()?);

        Ok(Self {
            state: Arc::new(ServerState {
                config,
                post_office: PostOffice::new(),
                metar,
                directory,
                jwt_secret,
                motd,
                shutdown,
            }),
            listeners,
            admin_listener,
        })
    }

    pub fn state(&self) -> Arc<ServerState> {
        Arc::clone(&self.state)
    }

    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        self.listeners
            .iter()
            .filter_map(|l| l.local_addr().ok())
            .collect()
    }

    pub fn admin_addr(&self) -> Option<SocketAddr> {
        self.admin_listener.local_addr().ok()
    }

    pub async fn run(self) -> Result<()> {
        let web_state = Arc::clone(&self.state);
        let admin_listener = self.admin_listener;
        tokio::spawn(async move {
            if let Err(e) = crate::web::serve(admin_listener, web_state).await {
                error!("admin channel error: {e}");
            }
        });

        let mut accept_tasks: Vec<JoinHandle<()>> = Vec::new();
        for listener in self.listeners {
            let state = Arc::clone(&self.state);
            accept_tasks.push(tokio::spawn(async move {
                loop {
                    let stream = tokio::select! {
                        accepted = listener.accept() => match accepted {
                            Ok((stream, _)) => stream,
                            Err(e) => {
                                error!("accept error: {e}");
                                continue;
                            }
                        },
                        _ = state.shutdown.cancelled() => break,
                    };
                    let state = Arc::clone(&state);
                    tokio::spawn(async move {
                        handle_connection(state, stream).await;
                    });
                }
            }));
        }

        self.state.shutdown.cancelled().await;
        for task in accept_tasks {
            task.abort();
        }
        Ok(())
    }
}

pub async fn handle_connection(state: Arc<ServerState>, stream: TcpStream) {
    let cancel = state.shutdown.child_token();
    let connection = match Connection::spawn(stream, cancel) {
        Ok(connection) => connection,
        Err(e) => {
            debug!("connection setup failed: {e}");
            return;
        }
    };

    let login = match login::negotiate(&state, &connection).await {
        Ok(login) => login,
        Err(LoginError::Rejected(err)) => {
            debug!(peer = %connection.peer_addr(), error = %err, "login rejected");
            connection.write_packet(err.serialize(), true).await;
            connection.cancel();
            return;
        }
        Err(LoginError::Disconnected) => {
            connection.cancel();
            return;
        }
    };
    let login::Login {
        session,
        channels,
        announcement,
    } = login;

    state
        .post_office
        .send_mail(&Mail::new(Arc::clone(&session), MailKind::Broadcast, &announcement));
    for line in &state.motd {
        let packet = format!(
            "#TM{}:{}:{}{}",
            SERVER_CALLSIGN,
            session.profile.callsign,
            line,
            crate::wire::PACKET_DELIMITER
        );
        connection.write_packet(packet, true).await;
    }

    event_loop::run(Arc::clone(&state), Arc::clone(&session), channels).await;

    // Single teardown path for quits, kills and drops.
    let departure = Delete {
        atc: session.profile.is_atc,
        from: session.profile.callsign.clone(),
        cid: session.profile.cid,
    };
    state.post_office.send_mail(&Mail::new(
        Arc::clone(&session),
        MailKind::Broadcast,
        departure.serialize(),
    ));
    state.post_office.deregister(&session);
    connection.cancel();
    info!(callsign = %session.profile.callsign, "client disconnected");
}
