//! Gateway-protocol forwarding.
//!
//! # Responsibilities
//! - Dial `<service>:<gateway_port>` with a bounded timeout
//! - Send BEGIN_REQUEST, the PARAMS environment and the body as STDIN
//! - Read the CGI header block from STDOUT and stream the rest to the client
//!
//! # Design Decisions
//! - One request per connection; the backend closes it after END_REQUEST
//! - The request body is written from its own task while the reply is read,
//!   so neither side is buffered whole in memory
//! - Connect, write and read failures each map to a 502; nothing is retried

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use axum::{body::Body, http::Request, response::Response};
use bytes::{Bytes, BytesMut};
use futures_util::{stream, StreamExt};
use tokio::io::{AsyncWrite, AsyncWriteExt, BufReader, ReadHalf};
use tokio::net::TcpStream;

use crate::error::{error_chain, FastCgiError};
use crate::fastcgi::params::{build_env, CgiEnv, EnvSettings};
use crate::fastcgi::record::{
    begin_request_body, encode_record, encode_stream, EndRequest, RecordReader, RecordType,
    ROLE_RESPONDER,
};
use crate::fastcgi::response::{build_response, parse_head, CgiHead};
use crate::http::response::{bad_gateway, find_head_end};
use crate::proxy::BackendForwarder;
use crate::resilience::timeouts;

/// Upper bound for the CGI header block.
pub const MAX_HEAD_LEN: usize = 64 * 1024;

type ReplyReader = RecordReader<BufReader<ReadHalf<TcpStream>>>;

/// Forwards requests to a FastCGI responder at `<service>:<port>`.
#[derive(Debug, Clone)]
pub struct FastCgiForwarder {
    port: u16,
    connect_timeout: Duration,
    env: EnvSettings,
}

impl FastCgiForwarder {
    pub fn new(port: u16, connect_timeout: Duration, env: EnvSettings) -> Self {
        Self {
            port,
            connect_timeout,
            env,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    async fn exchange(
        &self,
        service: &str,
        request: Request<Body>,
    ) -> Result<(CgiHead, Body), FastCgiError> {
        let target = format!("{}:{}", service, self.port);
        let stream = timeouts::connect(target.as_str(), self.connect_timeout)
            .await
            .map_err(|source| FastCgiError::Connect { target, source })?;

        let (parts, body) = request.into_parts();
        let env = build_env(&parts, &self.env);

        let (read_half, write_half) = tokio::io::split(stream);
        let writer = tokio::spawn(write_request(write_half, env, body));
        let mut reader = RecordReader::new(BufReader::new(read_half));

        match read_head(&mut reader, service).await {
            Ok(reply) => {
                let body = reply_body(reader, reply.leftover, reply.finished, service.to_string());
                Ok((reply.head, body))
            }
            Err(read_err) => {
                if writer.is_finished() {
                    if let Ok(Err(write_err)) = writer.await {
                        return Err(write_err);
                    }
                } else {
                    writer.abort();
                }
                Err(read_err)
            }
        }
    }
}

#[async_trait]
impl BackendForwarder for FastCgiForwarder {
    fn protocol(&self) -> &'static str {
        "fastcgi"
    }

    async fn forward(&self, service: &str, request: Request<Body>) -> Response {
        let method = request.method().clone();

        match self.exchange(service, request).await {
            Ok((head, body)) => {
                tracing::debug!(service = %service, status = %head.status, "FastCGI reply");
                build_response(head, &method, body)
            }
            Err(e) => {
                tracing::error!(service = %service, port = self.port, error = %error_chain(&e), "FastCGI request failed");
                bad_gateway(e.public_message())
            }
        }
    }
}

/// Write the full request: BEGIN_REQUEST, PARAMS, then the body as STDIN.
pub async fn write_request<W>(mut out: W, env: CgiEnv, body: Body) -> Result<(), FastCgiError>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = BytesMut::new();
    encode_record(
        &mut buf,
        RecordType::BeginRequest,
        &begin_request_body(ROLE_RESPONDER, false),
    );
    encode_stream(&mut buf, RecordType::Params, &env.encode());
    encode_record(&mut buf, RecordType::Params, &[]);
    out.write_all(&buf).await.map_err(FastCgiError::Write)?;

    let mut chunks = body.into_data_stream();
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.map_err(|e| FastCgiError::Write(io::Error::other(e)))?;
        if chunk.is_empty() {
            continue;
        }
        buf.clear();
        encode_stream(&mut buf, RecordType::Stdin, &chunk);
        out.write_all(&buf).await.map_err(FastCgiError::Write)?;
    }

    buf.clear();
    encode_record(&mut buf, RecordType::Stdin, &[]);
    out.write_all(&buf).await.map_err(FastCgiError::Write)?;
    out.flush().await.map_err(FastCgiError::Write)?;
    Ok(())
}

struct HeadReply {
    head: CgiHead,
    leftover: Bytes,
    finished: bool,
}

fn log_stderr(service: &str, content: &[u8]) {
    tracing::warn!(
        service = %service,
        stderr = %String::from_utf8_lossy(content).trim_end(),
        "FastCGI backend wrote to stderr"
    );
}

fn log_end(service: &str, content: &[u8]) {
    match EndRequest::decode(content) {
        Ok(end) if end.protocol_status != 0 => tracing::warn!(
            service = %service,
            protocol_status = end.protocol_status,
            app_status = end.app_status,
            "FastCGI request not completed"
        ),
        Ok(_) => {}
        Err(e) => tracing::debug!(service = %service, error = %e, "Ignoring malformed END_REQUEST"),
    }
}

/// Read STDOUT until the CGI header block is complete.
async fn read_head(reader: &mut ReplyReader, service: &str) -> Result<HeadReply, FastCgiError> {
    let mut buf = BytesMut::new();

    let finished = loop {
        let Some(record) = reader.next().await? else {
            break true;
        };
        match record.kind() {
            Some(RecordType::Stdout) => {
                buf.extend_from_slice(&record.content);
                if let Some(end) = find_head_end(&buf) {
                    let head = parse_head(&String::from_utf8_lossy(&buf[..end]));
                    let leftover = buf.split_off(end).freeze();
                    return Ok(HeadReply {
                        head,
                        leftover,
                        finished: false,
                    });
                }
                if buf.len() > MAX_HEAD_LEN {
                    return Err(FastCgiError::HeaderTooLarge {
                        limit: MAX_HEAD_LEN,
                    });
                }
            }
            Some(RecordType::Stderr) => log_stderr(service, &record.content),
            Some(RecordType::EndRequest) => {
                log_end(service, &record.content);
                break true;
            }
            other => tracing::debug!(service = %service, record_type = ?other, "Ignoring record"),
        }
    };

    // The reply ended without a blank line; whatever arrived is the head.
    if buf.is_empty() {
        return Err(FastCgiError::Read(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "backend closed the connection without a response",
        )));
    }
    Ok(HeadReply {
        head: parse_head(&String::from_utf8_lossy(&buf)),
        leftover: Bytes::new(),
        finished,
    })
}

struct BodyState {
    reader: ReplyReader,
    leftover: Option<Bytes>,
    done: bool,
    service: String,
}

/// Stream the remaining STDOUT content as the response body.
fn reply_body(reader: ReplyReader, leftover: Bytes, finished: bool, service: String) -> Body {
    let state = BodyState {
        reader,
        leftover: Some(leftover),
        done: finished,
        service,
    };

    let chunks = stream::unfold(state, |mut state| async move {
        if let Some(chunk) = state.leftover.take() {
            if !chunk.is_empty() {
                return Some((Ok(chunk), state));
            }
        }
        if state.done {
            return None;
        }

        loop {
            match state.reader.next().await {
                Ok(Some(record)) => match record.kind() {
                    Some(RecordType::Stdout) if !record.content.is_empty() => {
                        return Some((Ok(record.content), state));
                    }
                    Some(RecordType::Stderr) => log_stderr(&state.service, &record.content),
                    Some(RecordType::EndRequest) => {
                        log_end(&state.service, &record.content);
                        return None;
                    }
                    _ => {}
                },
                Ok(None) => return None,
                Err(e) => {
                    tracing::warn!(service = %state.service, error = %e, "FastCGI body interrupted");
                    state.done = true;
                    return Some((Err(io::Error::other(e)), state));
                }
            }
        }
    });

    Body::from_stream(chunks)
}
