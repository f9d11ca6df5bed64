// crates/worker/src/session.rs
//! The worker's long-running loop: update assets, open the control stream,
//! process tasks. Any cycle failure backs off and starts the cycle over.

use std::time::Duration;

use anyhow::{bail, Context};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info};

use crate::config::WorkerConfig;
use crate::runner;
use crate::update;

/// Pause before retrying after a failed cycle.
pub const RETRY_DELAY: Duration = Duration::from_secs(5);

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

pub struct WorkerClient {
    config: WorkerConfig,
    http: reqwest::Client,
}

impl WorkerClient {
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Run forever. Each failed cycle logs, sleeps, and retries; only the
    /// embedder (or Ctrl-C in the binary) ends the loop.
    pub async fn run(&self) {
        loop {
            if let Err(err) = self.cycle().await {
                error!(
                    error = format!("{err:#}"),
                    retry_secs = RETRY_DELAY.as_secs(),
                    "worker cycle failed, backing off"
                );
                tokio::time::sleep(RETRY_DELAY).await;
            }
        }
    }

    async fn cycle(&self) -> anyhow::Result<()> {
        self.update_assets().await?;
        self.work().await
    }

    async fn update_assets(&self) -> anyhow::Result<()> {
        info!("checking for update");
        let remote = update::remote_version(&self.http, &self.config.http_base()).await?;
        let installed = update::installed_version(&self.config.version_file).await;
        if self.config.always_update || installed.as_deref() != Some(remote.as_str()) {
            update::perform_update(&self.http, &self.config, &remote).await?;
        } else {
            info!("assets up to date");
        }
        Ok(())
    }

    /// One full control-stream session. Never returns success: however the
    /// stream ends (close, rejection, error), the cycle goes back through
    /// the backoff-and-update path.
    async fn work(&self) -> anyhow::Result<()> {
        let url = self.config.ws_url();
        debug!(%url, "connecting");
        let (ws, _) = connect_async(url.as_str())
            .await
            .context("connecting to dispatch server")?;
        let (mut sink, mut stream) = ws.split();

        match stream.next().await {
            Some(Ok(Message::Text(text))) if text.as_str() == "ready" => {}
            other => bail!("expected ready greeting, got {other:?}"),
        }

        let mut identify = self.config.identify_payload.clone();
        identify.insert("name".into(), Value::String(self.config.name.clone()));
        sink.send(Message::Text(Value::Object(identify).to_string().into()))
            .await
            .context("sending identify")?;
        info!(name = %self.config.name, "connected, waiting for tasks");

        loop {
            let Some(payload) = next_text(&mut sink, &mut stream).await? else {
                bail!("server closed the stream");
            };
            info!("running task");
            let result = self.execute(&payload, &mut sink, &mut stream).await?;
            debug!("submitting result");
            sink.send(Message::Text(result.to_string().into()))
                .await
                .context("sending result")?;
        }
    }

    /// Run the task while keeping the control stream serviced, so server
    /// pings are answered even during a long computation.
    async fn execute(
        &self,
        payload: &str,
        sink: &mut WsSink,
        stream: &mut WsSource,
    ) -> anyhow::Result<Value> {
        let task = runner::run_task(&self.config, payload);
        tokio::pin!(task);
        loop {
            tokio::select! {
                result = &mut task => return result.context("task execution failed"),
                frame = stream.next() => match frame {
                    Some(Ok(Message::Ping(data))) => {
                        sink.send(Message::Pong(data)).await.context("answering ping")?;
                    }
                    Some(Ok(Message::Close(_))) | None => bail!("server closed the stream mid-task"),
                    Some(Ok(_)) => {}
                    Some(Err(err)) => return Err(err).context("control stream failed mid-task"),
                },
            }
        }
    }
}

/// Next text frame, answering pings along the way. `None` on a clean close.
async fn next_text(sink: &mut WsSink, stream: &mut WsSource) -> anyhow::Result<Option<String>> {
    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => return Ok(Some(text.as_str().to_owned())),
            Some(Ok(Message::Ping(data))) => {
                sink.send(Message::Pong(data)).await.context("answering ping")?;
            }
            Some(Ok(Message::Close(_))) | None => return Ok(None),
            Some(Ok(_)) => {}
            Some(Err(err)) => return Err(err).context("control stream failed"),
        }
    }
}
