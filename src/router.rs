use std::net::SocketAddr;

use weblog::{debug, info};

use crate::cgi;
use crate::config::ServerConfig;
use crate::handlers::{delete_handler, get_handler};
use crate::http::request::{HttpRequest, Method};
use crate::http::response::{HttpResponse, error_response};
use crate::prelude::{HTTP_METHOD_NOT_ALLOWED, HTTP_NOT_FOUND, HTTP_OK};
use crate::upload;

/// What the supervisor does with a routed request. `/stop` asks for a
/// shutdown once its response is flushed, everything else just responds.
#[derive(Debug)]
pub enum RouteOutcome {
    Respond(HttpResponse),
    RespondThenShutdown(HttpResponse),
}

impl RouteOutcome {
    pub fn response(&self) -> &HttpResponse {
        match self {
            RouteOutcome::Respond(r) | RouteOutcome::RespondThenShutdown(r) => r,
        }
    }
}

pub fn route(
    request: &HttpRequest,
    server: &ServerConfig,
    peer: Option<SocketAddr>,
) -> RouteOutcome {
    if request.uri == "/stop" {
        info!("stop request received");
        return RouteOutcome::RespondThenShutdown(stop_page());
    }

    let Some(location) = server.find_location(&request.uri) else {
        debug!("no location for {}", request.uri);
        return RouteOutcome::Respond(error_response(HTTP_NOT_FOUND, Some(server)));
    };

    if let Some((status, target)) = &location.redirect {
        info!("redirect {}: {} -> {}", status, request.uri, target);
        return RouteOutcome::Respond(HttpResponse::redirect(*status, target));
    }

    if !request.method.is_allowed(&location.methods) {
        debug!("method {} not allowed for {}", request.method, request.uri);
        return RouteOutcome::Respond(error_response(HTTP_METHOD_NOT_ALLOWED, Some(server)));
    }

    let response = match request.method {
        Method::Post => upload::handle_post(request, location, server),
        Method::Delete => delete_handler::handle_delete(&request.uri, location, server),
        Method::Get
            if location.cgi_enabled && request.uri.ends_with(&location.cgi_extension) =>
        {
            cgi::handle_cgi(request, location, server, peer)
        }
        _ => get_handler::handle_get(&request.uri, location, server),
    };

    RouteOutcome::Respond(response)
}

fn stop_page() -> HttpResponse {
    let mut response = HttpResponse::new(HTTP_OK);
    response.set_body(
        "<!DOCTYPE html>\n<html><head><meta charset='UTF-8'>\
         <title>Server Stopping</title></head><body>\n\
         <h1>Server Shutting Down</h1>\n\
         <p>The server is stopping gracefully...</p>\n\
         </body></html>\n"
            .into(),
    );
    response
}
