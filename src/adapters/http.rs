//! Polling HTTP listener on `tiny_http`.
//!
//! `tiny_http` accepts connections and reads request heads on its own
//! worker threads; [`HttpPort::poll_request`] only takes a finished request
//! off its queue with `try_recv`, so a slow or stalled client never holds up
//! the runtime loop. The taken request is kept until `respond` answers it.

use std::io::Cursor;
use std::net::{Ipv4Addr, SocketAddr};

use log::{debug, warn};
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};

use crate::app::ports::{HttpError, HttpMethod, HttpPort, HttpRequest, HttpResponse};

/// Path component of a request target; the query string is not routed.
pub fn request_path(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}

fn method_of(method: &Method) -> HttpMethod {
    match method {
        Method::Get => HttpMethod::Get,
        Method::Head => HttpMethod::Head,
        Method::Post => HttpMethod::Post,
        _ => HttpMethod::Other,
    }
}

fn build_response(response: &HttpResponse) -> Response<Cursor<Vec<u8>>> {
    let out = Response::from_data(response.body.clone()).with_status_code(StatusCode(response.status));
    match Header::from_bytes(&b"Content-Type"[..], response.content_type.as_bytes()) {
        Ok(header) => out.with_header(header),
        Err(()) => out,
    }
}

#[derive(Default)]
pub struct HttpListener {
    server: Option<Server>,
    in_flight: Option<Request>,
}

impl HttpListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound address, once [`begin`](HttpPort::begin) succeeded.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.as_ref()?.server_addr().to_ip()
    }
}

impl HttpPort for HttpListener {
    fn begin(&mut self, port: u16) -> Result<(), HttpError> {
        let server = Server::http((Ipv4Addr::UNSPECIFIED, port)).map_err(|e| {
            warn!("HTTP: bind to port {} failed: {}", port, e);
            HttpError::Bind
        })?;
        self.server = Some(server);
        Ok(())
    }

    fn poll_request(&mut self) -> Option<HttpRequest> {
        // An unanswered request is released here; tiny_http answers it 500.
        self.in_flight = None;

        let server = self.server.as_ref()?;
        let request = match server.try_recv() {
            Ok(Some(request)) => request,
            Ok(None) => return None,
            Err(e) => {
                warn!("HTTP: receive failed: {}", e);
                return None;
            }
        };
        debug!("HTTP: {} {} from {:?}", request.method(), request.url(), request.remote_addr());
        let parsed = HttpRequest {
            method: method_of(request.method()),
            path: request_path(request.url()).to_owned(),
        };
        self.in_flight = Some(request);
        Some(parsed)
    }

    fn respond(&mut self, response: &HttpResponse) -> Result<(), HttpError> {
        let request = self.in_flight.take().ok_or(HttpError::NoRequest)?;
        request.respond(build_response(response)).map_err(|e| {
            debug!("HTTP: write failed: {}", e);
            HttpError::Io
        })
    }
}
