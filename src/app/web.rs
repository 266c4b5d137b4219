//! Diagnostic web interface.
//!
//! | Path                | Response                                     |
//! |---------------------|----------------------------------------------|
//! | `/`                 | Fixed HTML page linking to the log dump      |
//! | `/serialOut`        | Current capture ring contents, `text/plain`  |
//! | `/resetresetreset`  | None: forget WiFi credentials and restart    |
//! | anything else       | `404 Not Found`                              |
//!
//! No session state; every request maps to a response on its own. The
//! interface only does work inside [`WebInterface::handle_client`].

use log::{debug, info};

use super::ports::{HttpError, HttpPort, HttpResponse};
use crate::capture::CaptureReader;

pub const ROOT_PATH: &str = "/";
pub const SERIAL_OUT_PATH: &str = "/serialOut";
pub const RESET_PATH: &str = "/resetresetreset";

const HOME_PAGE: &str = r#"
        <html>
            <head><title>Web interface</title></head>
            <body>
                <h1>Web interface</h1>
                <a href="/serialOut">Latest serial output console</a>
            </body>
        </html>"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Root,
    SerialOut,
    Reset,
    NotFound,
}

/// Something the runtime loop must do on the interface's behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebAction {
    /// Clear stored WiFi credentials and restart.
    FactoryReset,
}

/// Map a request path to its route. Query strings are ignored.
pub fn route(path: &str) -> Route {
    let path = path.split_once('?').map_or(path, |(p, _)| p);
    match path {
        ROOT_PATH => Route::Root,
        SERIAL_OUT_PATH => Route::SerialOut,
        RESET_PATH => Route::Reset,
        _ => Route::NotFound,
    }
}

/// Log dump body: everything up to the first NUL byte.
pub fn serial_out_body(bytes: &[u8]) -> Vec<u8> {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    bytes[..end].to_vec()
}

pub struct WebInterface<H: HttpPort> {
    http: H,
    capture: CaptureReader,
    max_requests_per_poll: usize,
}

impl<H: HttpPort> WebInterface<H> {
    /// Bind `http` to `port` and serve `capture` at `/serialOut`.
    pub fn new(port: u16, capture: CaptureReader, mut http: H) -> Result<Self, HttpError> {
        http.begin(port)?;
        info!("Web interface listening on port {}", port);
        Ok(Self {
            http,
            capture,
            max_requests_per_poll: 1,
        })
    }

    /// Serve up to `n` pending requests per poll.
    #[must_use]
    pub fn with_max_requests_per_poll(mut self, n: usize) -> Self {
        self.max_requests_per_poll = n.max(1);
        self
    }

    /// Build the response for `route`. `None` for the reset route, which is
    /// never answered.
    pub fn render(&self, route: Route) -> Option<HttpResponse> {
        match route {
            Route::Root => {
                debug!("[WebInterface] Serving the home page.");
                Some(HttpResponse::ok("text/html", HOME_PAGE))
            }
            Route::SerialOut => {
                debug!("[WebInterface] Serving the serial logs.");
                Some(HttpResponse::ok(
                    "text/plain",
                    serial_out_body(&self.capture.snapshot()),
                ))
            }
            Route::Reset => None,
            Route::NotFound => Some(HttpResponse::not_found()),
        }
    }

    /// Service pending requests. Returns early with an action when a request
    /// needs the runtime loop to act.
    pub fn handle_client(&mut self) -> Option<WebAction> {
        for _ in 0..self.max_requests_per_poll {
            let request = self.http.poll_request()?;
            let route = route(&request.path);
            let Some(response) = self.render(route) else {
                info!("[WebInterface] Factory reset requested.");
                return Some(WebAction::FactoryReset);
            };
            if let Err(e) = self.http.respond(&response) {
                debug!("[WebInterface] {} {}: {}", response.status, request.path, e);
            }
        }
        None
    }

    pub fn http(&self) -> &H {
        &self.http
    }

    pub fn http_mut(&mut self) -> &mut H {
        &mut self.http
    }
}
