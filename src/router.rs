//! HTTP routing for certdesk.
//!
//! This module provides the request/response model and the path router the
//! API is built on:
//!
//! - Path and parameter-based routing of HTTP endpoints (`/user/:id`)
//! - Global and route-specific middleware (pre and post)
//! - Decoding of JSON, form and `multipart/form-data` bodies into a [`Request`]
//! - Serving the router over hyper through an axum catch-all
use crate::auth::Session;
use crate::error::AppError;
use crate::state::AppState;
use axum::extract::{DefaultBodyLimit, FromRequest, Multipart};
use futures::future::BoxFuture;
use percent_encoding::percent_decode_str;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;

#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    GET,
    POST,
    PUT,
    DELETE,
}

impl Method {
    pub fn parse(method: &str) -> Option<Method> {
        match method {
            "GET" => Some(Method::GET),
            "POST" => Some(Method::POST),
            "PUT" => Some(Method::PUT),
            "DELETE" => Some(Method::DELETE),
            _ => None,
        }
    }
}

/// Represents the outcome of an HTTP handler.
/// Supports HTML, JSON, binary payloads and custom status/headers.
#[derive(Debug)]
pub struct Response {
    pub status_code: u16,
    pub body: Vec<u8>,
    pub headers: HashMap<String, String>,
}

impl Response {
    /// Construct a new HTTP 404 "not found" response.
    pub fn not_found() -> Self {
        Response {
            status_code: 404,
            body: b"404 Not Found".to_vec(),
            headers: HashMap::new(),
        }
    }

    pub fn method_not_allowed() -> Self {
        Response {
            status_code: 405,
            body: b"405 Method Not Allowed".to_vec(),
            headers: HashMap::new(),
        }
    }

    /// HTML page with the given status.
    pub fn html(body: impl Into<String>, status_code: u16) -> Self {
        Response {
            status_code,
            body: body.into().into_bytes(),
            headers: HashMap::from([(
                "Content-Type".to_string(),
                "text/html; charset=utf-8".to_string(),
            )]),
        }
    }

    /// Raw bytes with an explicit content type.
    pub fn bytes(body: Vec<u8>, content_type: &str) -> Self {
        Response {
            status_code: 200,
            body,
            headers: HashMap::from([("Content-Type".to_string(), content_type.to_string())]),
        }
    }

    /// Construct a new HTTP JSON response.
    /// Accepts any serde-serializable payload, status, and custom headers.
    pub fn json<T: Serialize>(
        data: T,
        status_code: u16,
        mut headers: HashMap<String, String>,
    ) -> Self {
        headers.insert(
            "Content-Type".to_string(),
            "application/json; charset=utf-8".to_string(),
        );
        match serde_json::to_vec(&data) {
            Ok(body) => Response {
                status_code,
                body,
                headers,
            },
            Err(e) => {
                log::error!("Response serialization failed: {}", e);
                Response {
                    status_code: 500,
                    body: b"{\"success\":false,\"message\":\"Serialization failed\"}".to_vec(),
                    headers,
                }
            }
        }
    }

    pub fn with_header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.insert(key.to_string(), value.into());
        self
    }

    /// Body as UTF-8 text (lossy), mostly useful for text responses and tests.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json_body(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

/// Anything a handler may return.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response {
        self
    }
}

impl<T: IntoResponse> IntoResponse for Result<T, AppError> {
    fn into_response(self) -> Response {
        match self {
            Ok(resp) => resp.into_response(),
            Err(e) => e.into_response(),
        }
    }
}

/// One uploaded file from a multipart body.
#[derive(Clone, Debug)]
pub struct UploadedFile {
    pub field: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Clone, Debug, Default)]
pub struct FormData {
    pub fields: HashMap<String, String>,
    pub files: Vec<UploadedFile>,
}

/// A decoded HTTP request as handlers see it.
#[derive(Clone, Debug)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub params: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub headers: HashMap<String, String>,
    pub cookies: HashMap<String, String>,
    pub body: Vec<u8>,
    pub form: Option<FormData>,
    pub session: Option<Session>,
}

impl Request {
    pub fn new(method: Method, path: &str) -> Self {
        let (path, query) = match path.split_once('?') {
            Some((p, q)) => (p, parse_query(q)),
            None => (path, HashMap::new()),
        };
        Request {
            method,
            path: path.to_string(),
            params: HashMap::new(),
            query,
            headers: HashMap::new(),
            cookies: HashMap::new(),
            body: Vec::new(),
            form: None,
            session: None,
        }
    }

    pub fn with_json<T: Serialize>(mut self, value: &T) -> Self {
        self.body = serde_json::to_vec(value).unwrap_or_default();
        self.headers
            .insert("content-type".to_string(), "application/json".to_string());
        self
    }

    pub fn with_form(mut self, form: FormData) -> Self {
        self.form = Some(form);
        self
    }

    pub fn with_cookie(mut self, name: &str, value: &str) -> Self {
        self.cookies.insert(name.to_string(), value.to_string());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// A matched path parameter, already percent-decoded.
    pub fn param(&self, name: &str) -> Result<&str, AppError> {
        self.params
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| AppError::validation(format!("Missing path parameter `{}`", name)))
    }

    /// Decode the request payload into a typed schema.
    ///
    /// Multipart/urlencoded text fields are decoded as a flat string map, any
    /// other body as JSON. An empty body decodes as `{}`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, AppError> {
        if let Some(form) = &self.form {
            let value = serde_json::to_value(&form.fields)?;
            return Ok(serde_json::from_value(value)?);
        }
        if self.body.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(serde_json::from_str("{}")?);
        }
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn files(&self) -> &[UploadedFile] {
        self.form.as_ref().map(|f| f.files.as_slice()).unwrap_or(&[])
    }
}

/// Holds metadata about the current HTTP request and its extracted path parameters.
/// Middleware can modify/read this context.
pub struct RequestContext {
    pub method: Method,
    pub path: String,
    pub params: HashMap<String, String>,
    pub cookies: HashMap<String, String>,
    pub session: Option<Session>,
    pub start_time: Option<Instant>,
}

impl RequestContext {
    pub fn for_request(req: &Request) -> Self {
        RequestContext {
            method: req.method,
            path: req.path.clone(),
            params: HashMap::new(),
            cookies: req.cookies.clone(),
            session: req.session.clone(),
            start_time: Some(Instant::now()),
        }
    }
}

/// Type alias for async handler functions for HTTP routes.
pub type Handler = Arc<dyn Fn(Request, AppState) -> BoxFuture<'static, Response> + Send + Sync>;

/// Type alias for synchronous, pre-processing middleware executed before the handler.
/// If a middleware returns Some(Response), request handling stops and this response is sent.
pub type Middleware = Arc<dyn Fn(&mut RequestContext) -> Option<Response> + Send + Sync>;

/// Type alias for post-processing middleware executed after the handler.
/// Post-middleware can inspect/modify the response before it is sent.
pub type PostMiddleware = Arc<dyn Fn(&RequestContext, Response) -> Response + Send + Sync>;

/// Wrap an async handler function into a [`Handler`].
pub fn handler<F, Fut, R>(f: F) -> Handler
where
    F: Fn(Request, AppState) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse,
{
    Arc::new(
        move |req: Request, state: AppState| -> BoxFuture<'static, Response> {
            let fut = f(req, state);
            Box::pin(async move { fut.await.into_response() })
        },
    )
}

/// Represents a registered HTTP route and its associated handler + middleware.
#[derive(Clone)]
pub struct Route {
    pub method: Method,
    pub path_pattern: String,
    pub handler: Handler,
    pub middlewares: Vec<Middleware>,
}

/// The main application router.
/// Manages all HTTP routes and global middleware.
#[derive(Clone, Default)]
pub struct Router {
    pub routes: Vec<Route>,
    pub middlewares: Vec<Middleware>,
    pub post_middlewares: Vec<PostMiddleware>,
}

/// Maps status codes to HTTP status text for responses.
pub fn status_text(code: u16) -> &'static str {
    match code {
        200 => "OK",
        201 => "Created",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

impl Router {
    /// Create a new, empty application router.
    pub fn new() -> Self {
        Router::default()
    }

    /// Register an HTTP route with method, path pattern, handler, and any route-specific middleware.
    pub fn add_route(
        &mut self,
        method: Method,
        path_pattern: &str,
        handler: Handler,
        middlewares: Vec<Middleware>,
    ) {
        self.routes.push(Route {
            method,
            path_pattern: path_pattern.to_string(),
            handler,
            middlewares,
        });
    }

    /// Add a global pre-middleware to be run before all HTTP handlers.
    pub fn add_middleware(&mut self, middleware: Middleware) {
        self.middlewares.push(middleware);
    }

    /// Add a post-middleware to be run after each HTTP handler.
    pub fn add_post_middleware(&mut self, middleware: PostMiddleware) {
        self.post_middlewares.push(middleware);
    }

    /// Run one request through middleware, route matching and the handler.
    ///
    /// Post-middleware sees every response, including early middleware
    /// rejections and 404/405s.
    pub async fn dispatch(&self, mut req: Request, state: AppState) -> Response {
        let mut ctx = RequestContext::for_request(&req);
        let response = self.dispatch_inner(&mut ctx, &mut req, state).await;
        self.post_middlewares
            .iter()
            .fold(response, |resp, post| (post)(&ctx, resp))
    }

    async fn dispatch_inner(
        &self,
        ctx: &mut RequestContext,
        req: &mut Request,
        state: AppState,
    ) -> Response {
        for middleware in &self.middlewares {
            if let Some(response) = (middleware)(ctx) {
                return response;
            }
        }

        let mut path_matched = false;
        for route in &self.routes {
            let Some(params) = match_path(&route.path_pattern, &ctx.path) else {
                continue;
            };
            path_matched = true;
            if route.method != ctx.method {
                continue;
            }
            ctx.params = params;

            for middleware in &route.middlewares {
                if let Some(response) = (middleware)(ctx) {
                    return response;
                }
            }

            req.params = ctx.params.clone();
            req.session = ctx.session.clone();
            return (route.handler)(req.clone(), state).await;
        }

        if path_matched {
            Response::method_not_allowed()
        } else {
            Response::not_found()
        }
    }

    /// Start the HTTP server and serve until the listener fails.
    pub async fn run_http(
        self,
        state: AppState,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = state.settings.http_addr();
        let body_limit = state.settings.max_body_bytes;
        let router = Arc::new(self);

        let app = axum::Router::new()
            .fallback(move |req: axum::extract::Request| {
                let router = router.clone();
                let state = state.clone();
                async move {
                    let response = match decode_request(req, body_limit).await {
                        Ok(req) => router.dispatch(req, state).await,
                        Err(e) => e.into_response(),
                    };
                    into_http(response)
                }
            })
            .layer(DefaultBodyLimit::max(body_limit));

        let listener = TcpListener::bind(&addr).await?;
        log::info!("HTTP Server running on http://{}", addr);
        axum::serve(listener, app).await?;
        Ok(())
    }
}

/// Turn a hyper request into a [`Request`], buffering and decoding the body.
pub async fn decode_request(
    req: axum::extract::Request,
    body_limit: usize,
) -> Result<Request, AppError> {
    let Some(method) = Method::parse(req.method().as_str()) else {
        return Err(AppError::validation(format!(
            "Unsupported method {}",
            req.method()
        )));
    };
    let mut out = Request::new(method, req.uri().path());
    if let Some(q) = req.uri().query() {
        out.query = parse_query(q);
    }
    out.headers = req
        .headers()
        .iter()
        .filter_map(|(k, v)| {
            v.to_str()
                .ok()
                .map(|v| (k.as_str().to_ascii_lowercase(), v.to_string()))
        })
        .collect();
    if let Some(cookie) = out.headers.get("cookie") {
        out.cookies = parse_cookies(cookie);
    }

    let content_type = out.header("content-type").unwrap_or_default().to_string();
    if content_type.starts_with("multipart/form-data") {
        let mut multipart = Multipart::from_request(req, &())
            .await
            .map_err(|e| AppError::validation(format!("Malformed multipart body: {}", e)))?;
        let mut form = FormData::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::validation(format!("Malformed multipart body: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let content_type = field
                        .content_type()
                        .unwrap_or("application/octet-stream")
                        .to_string();
                    let bytes = field.bytes().await.map_err(|e| {
                        AppError::validation(format!("Failed to read upload: {}", e))
                    })?;
                    form.files.push(UploadedFile {
                        field: name,
                        file_name,
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
                None => {
                    let text = field.text().await.map_err(|e| {
                        AppError::validation(format!("Failed to read form field: {}", e))
                    })?;
                    form.fields.insert(name, text);
                }
            }
        }
        out.form = Some(form);
    } else {
        let bytes = axum::body::to_bytes(req.into_body(), body_limit)
            .await
            .map_err(|e| AppError::validation(format!("Request body rejected: {}", e)))?;
        if content_type.starts_with("application/x-www-form-urlencoded") {
            out.form = Some(FormData {
                fields: parse_query(&String::from_utf8_lossy(&bytes)),
                files: Vec::new(),
            });
        }
        out.body = bytes.to_vec();
    }
    Ok(out)
}

fn into_http(response: Response) -> axum::response::Response {
    let mut builder = axum::http::Response::builder().status(response.status_code);
    for (key, value) in &response.headers {
        builder = builder.header(key.as_str(), value.as_str());
    }
    builder
        .body(axum::body::Body::from(response.body))
        .unwrap_or_else(|e| {
            log::error!("Failed to build HTTP response: {}", e);
            let mut resp = axum::response::Response::new(axum::body::Body::empty());
            *resp.status_mut() = axum::http::StatusCode::INTERNAL_SERVER_ERROR;
            resp
        })
}

fn decode_component(raw: &str) -> String {
    percent_decode_str(&raw.replace('+', " "))
        .decode_utf8_lossy()
        .into_owned()
}

pub fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (decode_component(k), decode_component(v)),
            None => (decode_component(pair), String::new()),
        })
        .collect()
}

pub fn parse_cookies(header: &str) -> HashMap<String, String> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

#[macro_export]
macro_rules! route {
    ($router:expr, $( $method:ident $path:expr => { $handler:expr $(, $middleware:expr )* } ),* $(,)?) => {
        $(
            $router.add_route(
                $crate::router::Method::$method,
                $path,
                $crate::router::handler($handler),
                vec![$($middleware.clone()),*]
            );
        )*
    };
}

/// Matches a path pattern (e.g. `/foo/:id`) against a real path,
/// extracting percent-decoded parameters into a HashMap if matched, or None if not.
pub fn match_path(pattern: &str, path: &str) -> Option<HashMap<String, String>> {
    let pattern_parts: Vec<&str> = pattern.trim_matches('/').split('/').collect();
    let path_parts: Vec<&str> = path.trim_matches('/').split('/').collect();

    if pattern_parts.len() != path_parts.len() {
        return None;
    }

    let mut params = HashMap::new();

    for (p, a) in pattern_parts.iter().zip(path_parts.iter()) {
        if let Some(name) = p.strip_prefix(':') {
            if a.is_empty() {
                return None;
            }
            let value = percent_decode_str(a).decode_utf8_lossy().into_owned();
            params.insert(name.to_string(), value);
        } else if p != a {
            return None;
        }
    }

    Some(params)
}
