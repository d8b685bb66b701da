//! Unix Socket Server (Hardened)
//!
//! Async server translating the JSON-lines client protocol into engine
//! dispatcher requests.
//!
//! # Security Features
//! - **Socket permissions**: Restrictive mode with symlink attack prevention
//! - **Peer credentials**: Audit logging of UID/GID/PID for every connection
//! - **Connection limits**: Maximum concurrent connections enforced
//! - **Rate limiting**: Per-uid request rate limiting
//! - **Timeouts**: Read/write timeouts prevent resource exhaustion
//! - **Message limits**: Maximum message size prevents memory exhaustion
//! - **Input validation**: State codes validated server-side before dispatch

use std::collections::HashMap;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, error, info, trace, warn};

use hc_core::config::DaemonSettings;
use hc_core::{Dispatcher, RegisterBackend};
use hc_protocol::{
    codes, CpuInfo, PerformanceData, Request, RequestEnvelope, Response, ResponseData,
    ResponseEnvelope, MAX_MESSAGE_SIZE, SET_STATE_WIRE_SIZE,
};

// ============================================================================
// Security Constants
// ============================================================================

/// Maximum concurrent client connections
const MAX_CONNECTIONS: usize = 64;

/// Read timeout per message
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Write timeout per message
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Rate limit: maximum requests per window per uid
const RATE_LIMIT_REQUESTS: u32 = 1200;

/// Rate limit window duration
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(10);

/// Socket permissions (0666 = world read/write; the engine carries no
/// secrets and state changes are auditable per uid)
const SOCKET_MODE: u32 = 0o666;

/// Global connection counter
static ACTIVE_CONNECTIONS: AtomicUsize = AtomicUsize::new(0);

// ============================================================================
// Bounded line reading
// ============================================================================

async fn read_line_bounded<R: tokio::io::AsyncBufRead + Unpin>(
    reader: &mut R,
    out: &mut Vec<u8>,
    max_len: usize,
) -> std::io::Result<usize> {
    out.clear();

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(0);
        }

        let mut take_len = available.len();
        let mut found_newline = false;
        if let Some(pos) = available.iter().position(|b| *b == b'\n') {
            take_len = pos + 1;
            found_newline = true;
        }

        let remaining = max_len.saturating_sub(out.len());
        if take_len > remaining {
            // Consume enough to make forward progress, but don't buffer beyond max_len.
            let consume_len = remaining.min(available.len());
            reader.consume(consume_len);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "Message too large",
            ));
        }

        out.extend_from_slice(&available[..take_len]);
        reader.consume(take_len);

        if found_newline {
            return Ok(out.len());
        }
    }
}

// ============================================================================
// Rate limiting
// ============================================================================

struct ClientState {
    request_count: u32,
    window_start: Instant,
}

/// Rate limiter state per client (keyed by UID)
struct RateLimiter {
    clients: HashMap<u32, ClientState>,
}

impl RateLimiter {
    fn new() -> Self {
        Self {
            clients: HashMap::new(),
        }
    }

    /// Check if a client is rate limited. Returns true if allowed, false if limited.
    fn check_and_increment(&mut self, uid: u32) -> bool {
        let now = Instant::now();

        let state = self.clients.entry(uid).or_insert(ClientState {
            request_count: 0,
            window_start: now,
        });

        if now.duration_since(state.window_start) > RATE_LIMIT_WINDOW {
            state.request_count = 0;
            state.window_start = now;
        }

        if state.request_count >= RATE_LIMIT_REQUESTS {
            return false;
        }

        state.request_count += 1;
        true
    }

    /// Cleanup old entries to prevent memory growth
    fn cleanup(&mut self) {
        let now = Instant::now();
        self.clients
            .retain(|_, state| now.duration_since(state.window_start) < RATE_LIMIT_WINDOW * 2);
    }
}

// ============================================================================
// Peer credentials
// ============================================================================

/// Client credentials from Unix socket peer
#[derive(Debug, Clone, Copy)]
struct PeerCredentials {
    uid: u32,
    gid: u32,
    pid: i32,
}

/// Get peer credentials (uid, gid, pid) from Unix socket
fn get_peer_credentials(stream: &UnixStream) -> Option<PeerCredentials> {
    use std::os::unix::io::AsRawFd;

    let fd = stream.as_raw_fd();

    // Linux uses SO_PEERCRED with ucred struct
    #[cfg(target_os = "linux")]
    {
        // SAFETY: ucred is a simple C struct with no pointers. Zeroing it is safe and creates a valid initial state.
        let mut cred: libc::ucred = unsafe { std::mem::zeroed() };
        let mut len = std::mem::size_of::<libc::ucred>() as libc::socklen_t;

        // SAFETY: getsockopt is safe when:
        // 1. fd is a valid socket file descriptor (guaranteed by caller)
        // 2. cred is properly initialized (zeroed above)
        // 3. len is set to the correct size of ucred struct
        let result = unsafe {
            libc::getsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_PEERCRED,
                &mut cred as *mut _ as *mut libc::c_void,
                &mut len,
            )
        };

        if result == 0 {
            return Some(PeerCredentials {
                uid: cred.uid,
                gid: cred.gid,
                pid: cred.pid,
            });
        }
    }

    // BSD uses getpeereid (simpler, no PID)
    #[cfg(any(
        target_os = "freebsd",
        target_os = "openbsd",
        target_os = "netbsd",
        target_os = "dragonfly",
        target_os = "macos"
    ))]
    {
        let mut uid: libc::uid_t = 0;
        let mut gid: libc::gid_t = 0;

        // SAFETY: getpeereid is safe when fd is a valid socket descriptor and
        // uid/gid are valid mutable references
        let result = unsafe { libc::getpeereid(fd, &mut uid, &mut gid) };

        if result == 0 {
            return Some(PeerCredentials {
                uid,
                gid,
                pid: 0, // BSD doesn't provide PID via getpeereid
            });
        }
    }

    None
}

// ============================================================================
// Server
// ============================================================================

/// Run the Unix socket server around the engine dispatcher
pub async fn run_server<B: RegisterBackend + 'static>(
    socket_path: &str,
    dispatcher: Arc<Dispatcher<B>>,
    settings: DaemonSettings,
) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(socket_path);

    // SECURITY: Remove existing socket only if it's actually a socket
    if path.exists() {
        let metadata = path.symlink_metadata()?;

        // Refuse to remove symlinks (prevent symlink attacks)
        if metadata.file_type().is_symlink() {
            return Err("Socket path is a symlink - refusing for security".into());
        }

        std::fs::remove_file(path)?;
        debug!("Removed existing socket file");
    }

    let listener = UnixListener::bind(socket_path)?;
    std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(SOCKET_MODE))?;

    info!("Listening on {} (mode {:o})", socket_path, SOCKET_MODE);
    info!(
        "Security: max_conn={}, max_msg={}, rate_limit={}/{:?}",
        MAX_CONNECTIONS, MAX_MESSAGE_SIZE, RATE_LIMIT_REQUESTS, RATE_LIMIT_WINDOW
    );

    let rate_limiter = Arc::new(Mutex::new(RateLimiter::new()));
    let settings = Arc::new(settings);

    // Periodic cleanup task for rate limiter
    let rate_limiter_cleanup = rate_limiter.clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(RATE_LIMIT_WINDOW).await;
            rate_limiter_cleanup.lock().await.cleanup();
        }
    });

    // Handle shutdown signal
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let current = ACTIVE_CONNECTIONS.load(Ordering::SeqCst);
                        if current >= MAX_CONNECTIONS {
                            warn!("Connection limit reached ({}), rejecting new connection", current);
                            drop(stream);
                            continue;
                        }

                        ACTIVE_CONNECTIONS.fetch_add(1, Ordering::SeqCst);
                        let rate_limiter = rate_limiter.clone();
                        let dispatcher = dispatcher.clone();
                        let settings = settings.clone();

                        tokio::spawn(async move {
                            handle_client(stream, rate_limiter, dispatcher, settings).await;
                            ACTIVE_CONNECTIONS.fetch_sub(1, Ordering::SeqCst);
                        });
                    }
                    Err(e) => {
                        error!("Accept error: {}", e);
                    }
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    // Cleanup socket
    let _ = std::fs::remove_file(socket_path);
    info!("Server stopped");

    Ok(())
}

/// Handle a single client connection
async fn handle_client<B: RegisterBackend>(
    stream: UnixStream,
    rate_limiter: Arc<Mutex<RateLimiter>>,
    dispatcher: Arc<Dispatcher<B>>,
    settings: Arc<DaemonSettings>,
) {
    let cred = match get_peer_credentials(&stream) {
        Some(c) => c,
        None => {
            error!("Failed to get peer credentials, rejecting connection");
            return;
        }
    };

    debug!(
        "Connection from uid={}, gid={}, pid={}",
        cred.uid, cred.gid, cred.pid
    );

    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line: Vec<u8> = Vec::with_capacity(1024);
    let mut request_count: u64 = 0;
    let connection_start = Instant::now();

    loop {
        let read_result = timeout(
            READ_TIMEOUT,
            read_line_bounded(&mut reader, &mut line, MAX_MESSAGE_SIZE),
        )
        .await;

        match read_result {
            Ok(Ok(0)) => {
                debug!(
                    "Client disconnected: uid={}, pid={}, requests={}, duration={:?}",
                    cred.uid,
                    cred.pid,
                    request_count,
                    connection_start.elapsed()
                );
                break;
            }
            Ok(Ok(n)) => {
                {
                    let mut limiter = rate_limiter.lock().await;
                    if !limiter.check_and_increment(cred.uid) {
                        warn!("Rate limit exceeded for uid={}, pid={}", cred.uid, cred.pid);
                        let envelope =
                            ResponseEnvelope::new(0, Response::error("Rate limit exceeded"));
                        let _ = send_response(&mut writer, &envelope).await;
                        continue;
                    }
                }

                request_count += 1;
                trace!("Request #{} from uid={}: {} bytes", request_count, cred.uid, n);

                let line_str = match std::str::from_utf8(&line) {
                    Ok(s) => s,
                    Err(e) => {
                        debug!("Non-UTF8 request from uid={}: {}", cred.uid, e);
                        let envelope =
                            ResponseEnvelope::new(0, Response::error("Invalid request encoding"));
                        let _ = send_response(&mut writer, &envelope).await;
                        break;
                    }
                };

                let envelope = process_request(line_str, &cred, &dispatcher, &settings);
                if send_response(&mut writer, &envelope).await.is_err() {
                    break;
                }
            }
            Ok(Err(e)) => {
                if e.kind() == std::io::ErrorKind::InvalidData
                    && e.to_string().contains("Message too large")
                {
                    warn!(
                        "Message too large (>{} bytes) from uid={}, pid={}",
                        MAX_MESSAGE_SIZE, cred.uid, cred.pid
                    );
                    let envelope = ResponseEnvelope::new(0, Response::error("Message too large"));
                    let _ = send_response(&mut writer, &envelope).await;
                } else {
                    error!("Read error from uid={}, pid={}: {}", cred.uid, cred.pid, e);
                }
                break;
            }
            Err(_) => {
                debug!("Read timeout for uid={}, pid={}", cred.uid, cred.pid);
                let envelope = ResponseEnvelope::new(0, Response::error("Read timeout"));
                let _ = send_response(&mut writer, &envelope).await;
                break;
            }
        }
    }
}

/// Send response with timeout
async fn send_response(
    writer: &mut tokio::net::unix::OwnedWriteHalf,
    envelope: &ResponseEnvelope,
) -> Result<(), ()> {
    let response_json = serde_json::to_string(envelope).unwrap_or_else(|_| {
        r#"{"id":0,"status":"error","message":"Serialization error"}"#.to_string()
    });

    let write_result = timeout(WRITE_TIMEOUT, async {
        writer.write_all(response_json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        Ok::<_, std::io::Error>(())
    })
    .await;

    match write_result {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(e)) => {
            error!("Write error: {}", e);
            Err(())
        }
        Err(_) => {
            error!("Write timeout");
            Err(())
        }
    }
}

/// Process a single request and return the response envelope
fn process_request<B: RegisterBackend>(
    line: &str,
    cred: &PeerCredentials,
    dispatcher: &Dispatcher<B>,
    settings: &DaemonSettings,
) -> ResponseEnvelope {
    let envelope: RequestEnvelope = match serde_json::from_str(line.trim()) {
        Ok(e) => e,
        Err(e) => {
            debug!("Invalid JSON from uid={}: {}", cred.uid, e);
            return ResponseEnvelope::new(0, Response::error("Invalid request format"));
        }
    };

    let request_id = envelope.id;
    let request = envelope.request;

    // Double validation: validate request parameters server-side
    if let Err(e) = request.validate() {
        warn!("Request validation failed from uid={}: {}", cred.uid, e);
        return ResponseEnvelope::new(request_id, Response::error(e));
    }

    debug!(
        "Request {} from uid={} (id={})",
        request.type_name(),
        cred.uid,
        request_id
    );

    let response = match request {
        Request::Ping => Response::ok_string("pong"),

        Request::Version => Response::ok_string(crate::VERSION),

        Request::GetCpuInfo => {
            let mut buf = [0u8; CpuInfo::WIRE_SIZE];
            match dispatcher.handle_request(codes::GET_CPU_INFO, &[], &mut buf) {
                Ok(_) => match CpuInfo::from_wire(&buf) {
                    Ok(info) => Response::Ok(ResponseData::cpu(info)),
                    Err(e) => Response::error(e),
                },
                Err(e) => Response::error(e.to_string()),
            }
        }

        Request::GetPerformanceData => {
            let mut buf = [0u8; PerformanceData::WIRE_SIZE];
            match dispatcher.handle_request(codes::GET_PERFORMANCE_DATA, &[], &mut buf) {
                Ok(_) => match PerformanceData::from_wire(&buf) {
                    Ok(data) => Response::Ok(ResponseData::perf(data)),
                    Err(e) => Response::error(e),
                },
                Err(e) => Response::error(e.to_string()),
            }
        }

        Request::SetPerformanceState { state } => {
            let mut input = [0u8; SET_STATE_WIRE_SIZE];
            input.copy_from_slice(&state.to_le_bytes());
            match dispatcher.handle_request(codes::SET_PERFORMANCE_STATE, &input, &mut []) {
                Ok(_) => {
                    info!("Performance state {} set by uid={}", state, cred.uid);
                    Response::ok()
                }
                Err(e) => Response::error(e.to_string()),
            }
        }

        Request::Reset => {
            match dispatcher.handle_request(codes::RESET_ENGINE, &[], &mut []) {
                Ok(_) => {
                    info!("Engine reset by uid={}", cred.uid);
                    // A reset reverts the engine to built-in defaults; bring the
                    // configured limits and startup state back.
                    crate::apply_settings(dispatcher, settings);
                    Response::ok()
                }
                Err(e) => Response::error(e.to_string()),
            }
        }

        Request::GetStatistics => Response::Ok(ResponseData::stats(dispatcher.statistics())),
    };

    ResponseEnvelope::new(request_id, response)
}
