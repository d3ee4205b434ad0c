use crate::metrics;
use crate::tv::{Input, TVConnection};
use crate::wol::{MacAddr, Targets, WolError};
use log::{info, warn};
use rouille::{router, Request, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::{self, Read};
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Set by `tailscale serve` on proxied requests.
pub const TAILSCALE_USER_HEADER: &str = "Tailscale-User-Login";

pub type SharedTV = Arc<Mutex<Box<dyn TVConnection + Send>>>;

/// Response body for every endpoint.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Envelope {
    pub ok: bool,
    pub message: String,
}

fn reply(status: u16, ok: bool, message: impl Into<String>) -> Response {
    Response::json(&Envelope {
        ok,
        message: message.into(),
    })
    .with_status_code(status)
}

#[derive(thiserror::Error, Debug)]
pub enum RequestError {
    #[error("could not read request body: {0}")]
    Read(#[from] io::Error),
    #[error("invalid JSON body: {0}")]
    BadBody(#[from] serde_json::Error),
    #[error("request body must be a JSON object")]
    NotAnObject,
    #[error("input must be an integer between 1 and 4, got {0}")]
    BadInput(i64),
}

impl From<RequestError> for Response {
    fn from(e: RequestError) -> Self {
        reply(400, false, e.to_string())
    }
}

/// Parses the body as a JSON object, treating an empty body as absent.
fn json_body<T: DeserializeOwned>(request: &Request) -> Result<Option<T>, RequestError> {
    let mut body = Vec::new();
    if let Some(mut data) = request.data() {
        data.read_to_end(&mut body)?;
    }
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    // Derived struct deserializers also accept arrays.
    let value: serde_json::Value = serde_json::from_slice(&body)?;
    if !value.is_object() {
        return Err(RequestError::NotAnObject);
    }
    Ok(Some(serde_json::from_value(value)?))
}

#[derive(Deserialize, Debug, Default)]
pub struct OnRequest {
    input: Option<i64>,
}

impl OnRequest {
    fn input(&self) -> Result<Option<Input>, RequestError> {
        self.input
            .map(|n| {
                u8::try_from(n)
                    .ok()
                    .and_then(|port| Input::from_port(port).ok())
                    .ok_or(RequestError::BadInput(n))
            })
            .transpose()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub tv: SharedTV,
}

impl AppState {
    pub fn new(tv: Box<dyn TVConnection + Send>) -> Self {
        Self {
            tv: Arc::new(Mutex::new(tv)),
        }
    }

    // A panic mid-command must not take the gateway down with it.
    fn tv(&self) -> MutexGuard<'_, Box<dyn TVConnection + Send>> {
        self.tv.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn status(state: &AppState) -> Response {
    match state.tv().power_state() {
        Ok(power) => reply(200, true, power.to_string()),
        Err(e) => reply(500, false, e.to_string()),
    }
}

fn power_on(request: &Request, state: &AppState) -> Response {
    let input = match json_body::<OnRequest>(request).and_then(|body| {
        body.unwrap_or_default().input()
    }) {
        Ok(input) => input,
        Err(e) => return e.into(),
    };
    match state.tv().power_on(input) {
        Ok(()) => reply(200, true, "on"),
        Err(e) => reply(500, false, e.to_string()),
    }
}

fn power_off(state: &AppState) -> Response {
    match state.tv().power_off() {
        Ok(()) => reply(200, true, "off"),
        Err(e) => reply(500, false, e.to_string()),
    }
}

fn varz() -> Response {
    match metrics::gather() {
        Ok(text) => Response::text(text),
        Err(e) => Response::text(e.to_string()).with_status_code(500),
    }
}

/// Handles a request on the LAN listener.
pub fn handle_lan(request: &Request, state: &AppState) -> Response {
    let (route, response) = if request.header(TAILSCALE_USER_HEADER).is_some() {
        ("forbidden", reply(403, false, "forbidden: LAN access only"))
    } else {
        router!(request,
            (GET) (/status) => { ("/status", status(state)) },
            (GET) (/tv/status) => { ("/status", status(state)) },
            (POST) (/on) => { ("/on", power_on(request, state)) },
            (POST) (/tv/on) => { ("/on", power_on(request, state)) },
            (POST) (/off) => { ("/off", power_off(state)) },
            (POST) (/tv/off) => { ("/off", power_off(state)) },
            (GET) (/varz) => { ("/varz", varz()) },
            _ => ("unmatched", Response::empty_404())
        )
    };
    log_request(request, route, &response);
    response
}

fn log_request(request: &Request, route: &str, response: &Response) {
    info!(
        "{method} {request} {status}",
        method = request.method(),
        request = request.raw_url(),
        status = response.status_code,
    );
    metrics::record_request(route, response.status_code);
}

pub type WakeFn = dyn Fn(MacAddr, Ipv4Addr) -> io::Result<()> + Send + Sync;

pub struct WolState {
    pub targets: Targets,
    pub broadcast: Ipv4Addr,
    pub wake: Box<WakeFn>,
}

#[derive(Deserialize, Debug, Default)]
pub struct WolRequest {
    target: Option<String>,
    mac: Option<String>,
}

fn wake(request: &Request, state: &WolState) -> Response {
    if request.header(TAILSCALE_USER_HEADER).is_none() {
        return reply(403, false, "forbidden: Tailscale identity required");
    }
    let body = match json_body::<WolRequest>(request) {
        Ok(body) => body.unwrap_or_default(),
        Err(e) => return e.into(),
    };

    let mac = match (&body.target, &body.mac) {
        (Some(name), _) => match state.targets.get(name) {
            Some(target) => &target.mac,
            None => {
                let available = if state.targets.is_empty() {
                    "(none)".to_string()
                } else {
                    state.targets.keys().cloned().collect::<Vec<_>>().join(", ")
                };
                return reply(
                    400,
                    false,
                    format!("unknown target: '{}' (available: {})", name, available),
                );
            }
        },
        (None, Some(mac)) => mac,
        (None, None) => return reply(400, false, "request must include 'target' or 'mac'"),
    };

    let mac: MacAddr = match mac.parse() {
        Ok(mac) => mac,
        Err(e) => return reply(400, false, e.to_string()),
    };
    match (state.wake)(mac, state.broadcast) {
        Ok(()) => reply(200, true, format!("WoL packet sent to {}", mac)),
        Err(e) => {
            let e = WolError::from(e);
            warn!("WoL to {} failed: {}", mac, e);
            reply(500, false, e.to_string())
        }
    }
}

/// Handles a request on the Wake-on-LAN listener.
pub fn handle_wol(request: &Request, state: &WolState) -> Response {
    let response = router!(request,
        (GET) (/wol) => { reply(200, true, "ready") },
        (POST) (/wol) => { wake(request, state) },
        _ => Response::empty_404()
    );
    log_request(request, "/wol", &response);
    response
}
