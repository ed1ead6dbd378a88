//! Proxy lifecycle integration tests.
//!
//! Covers:
//! - frame delivery in both directions
//! - interrupt sending a close frame
//! - redial after an unexpected close, with subscription replay order

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{accept_async, tungstenite::Message};

use tickerflow_ws::{Proxy, ProxyConfig, ProxyState};

/// Command sent to one mock connection.
#[derive(Debug)]
enum ConnCmd {
    /// Send a text frame to the client.
    Send(String),
    /// Drop the TCP stream without a close handshake.
    DropAbruptly,
    /// Perform a normal websocket close.
    CloseClean,
}

/// One accepted connection: its received frames and a command channel.
struct ConnRecord {
    received: Arc<Mutex<Vec<String>>>,
    cmd_tx: mpsc::Sender<ConnCmd>,
}

/// Mock websocket server recording per-connection traffic.
struct MockWsServer {
    addr: SocketAddr,
    conns: Arc<Mutex<Vec<ConnRecord>>>,
}

impl MockWsServer {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let conns: Arc<Mutex<Vec<ConnRecord>>> = Arc::new(Mutex::new(Vec::new()));

        let conns_clone = conns.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let received = Arc::new(Mutex::new(Vec::new()));
                let (cmd_tx, cmd_rx) = mpsc::channel(8);

                conns_clone.lock().await.push(ConnRecord {
                    received: received.clone(),
                    cmd_tx,
                });

                tokio::spawn(handle_connection(stream, received, cmd_rx));
            }
        });

        Self { addr, conns }
    }

    fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    async fn connection_count(&self) -> usize {
        self.conns.lock().await.len()
    }

    async fn received_on(&self, conn: usize) -> Vec<String> {
        match self.conns.lock().await.get(conn) {
            Some(record) => record.received.lock().await.clone(),
            None => Vec::new(),
        }
    }

    async fn command(&self, conn: usize, cmd: ConnCmd) {
        let tx = self.conns.lock().await[conn].cmd_tx.clone();
        tx.send(cmd).await.unwrap();
    }
}

async fn handle_connection(
    stream: TcpStream,
    received: Arc<Mutex<Vec<String>>>,
    mut cmd_rx: mpsc::Receiver<ConnCmd>,
) {
    let ws = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(_) => return,
    };
    let (mut write, mut read) = ws.split();

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                Some(ConnCmd::Send(text)) => {
                    let _ = write.send(Message::Text(text)).await;
                }
                Some(ConnCmd::DropAbruptly) => {
                    // Reunite and drop the TCP stream with no close handshake.
                    return;
                }
                Some(ConnCmd::CloseClean) => {
                    let _ = write
                        .send(Message::Close(Some(CloseFrame {
                            code: CloseCode::Normal,
                            reason: "".into(),
                        })))
                        .await;
                    return;
                }
                None => return,
            },
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    received.lock().await.push(text.to_string());
                }
                Some(Ok(Message::Close(_))) | None => return,
                Some(Ok(_)) => {}
                Some(Err(_)) => return,
            },
        }
    }
}

/// Poll until `cond` holds or the timeout elapses.
async fn wait_for<F, Fut>(cond: F) -> bool
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    timeout(Duration::from_secs(3), async {
        loop {
            if cond().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .is_ok()
}

#[tokio::test]
async fn test_frames_flow_both_ways() {
    let server = MockWsServer::start().await;
    let (response_tx, mut response_rx) = mpsc::channel(16);

    let proxy = Arc::new(
        Proxy::connect(
            ProxyConfig {
                url: server.url(),
                label: "Test".to_string(),
            },
            response_tx,
        )
        .await
        .unwrap(),
    );
    assert_eq!(proxy.state(), ProxyState::Ready);

    let handle = proxy.handle();
    let runner = {
        let proxy = proxy.clone();
        tokio::spawn(async move { proxy.start().await })
    };

    handle.send("hello".to_string()).await.unwrap();
    assert!(
        wait_for(|| async { server.received_on(0).await == vec!["hello".to_string()] }).await,
        "server should receive the frame"
    );

    server.command(0, ConnCmd::Send("world".to_string())).await;
    let got = timeout(Duration::from_secs(3), response_rx.recv())
        .await
        .expect("response within timeout")
        .expect("channel open");
    assert_eq!(got, "world");

    handle.interrupt();
    let result = timeout(Duration::from_secs(3), runner)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
    assert_eq!(proxy.state(), ProxyState::Terminated);
}

#[tokio::test]
async fn test_clean_close_terminates_without_redial() {
    let server = MockWsServer::start().await;
    let (response_tx, _response_rx) = mpsc::channel(16);

    let proxy = Arc::new(
        Proxy::connect(
            ProxyConfig {
                url: server.url(),
                label: "Test".to_string(),
            },
            response_tx,
        )
        .await
        .unwrap(),
    );

    let runner = {
        let proxy = proxy.clone();
        tokio::spawn(async move { proxy.start().await })
    };

    assert!(wait_for(|| async { server.connection_count().await == 1 }).await);
    server.command(0, ConnCmd::CloseClean).await;

    let result = timeout(Duration::from_secs(3), runner)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok(), "clean close should not be an error");
    assert_eq!(proxy.state(), ProxyState::Terminated);
    assert_eq!(server.connection_count().await, 1, "no redial expected");
}

#[tokio::test]
async fn test_reconnect_replays_subscriptions_in_order() {
    let server = MockWsServer::start().await;
    let (response_tx, _response_rx) = mpsc::channel(16);

    let proxy = Arc::new(
        Proxy::connect(
            ProxyConfig {
                url: server.url(),
                label: "Test".to_string(),
            },
            response_tx,
        )
        .await
        .unwrap(),
    );
    let handle = proxy.handle();

    // The adapter would log these subscribe frames as it sends them.
    let f1 = r#"{"event":"subscribe","channel":"ticker","symbol":"tBTCUSD"}"#.to_string();
    let f2 = r#"{"event":"subscribe","channel":"ticker","symbol":"tETHUSD"}"#.to_string();
    handle.subscriptions().append(f1.clone());
    handle.subscriptions().append(f2.clone());

    let runner = {
        let proxy = proxy.clone();
        tokio::spawn(async move { proxy.start().await })
    };
    assert!(wait_for(|| async { server.connection_count().await == 1 }).await);

    // Force an unexpected close: the server drops TCP with no handshake.
    server.command(0, ConnCmd::DropAbruptly).await;

    // The proxy redials once and replays the log on the new connection.
    assert!(
        wait_for(|| async { server.connection_count().await == 2 }).await,
        "proxy should redial"
    );
    assert!(
        wait_for(|| async { server.received_on(1).await.len() >= 2 }).await,
        "replay should arrive on the new connection"
    );

    // A frame enqueued after the reconnect arrives after the replay.
    handle.send("after".to_string()).await.unwrap();
    assert!(wait_for(|| async { server.received_on(1).await.len() == 3 }).await);

    let frames = server.received_on(1).await;
    assert_eq!(frames, vec![f1, f2, "after".to_string()]);

    handle.interrupt();
    let _ = timeout(Duration::from_secs(3), runner).await;
}
