//! `ping`: answers in chat and over HTTP.

use pewter::framework::{HttpRequest, RegistrationResult};
use pewter::prelude::*;
use serde_json::json;

const PONG: &str = "PONG PONG PONG";

async fn respond_to_ping(response: Response) -> Result<(), BoxError> {
    response.reply(PONG);
    Ok(())
}

async fn http_ping(_request: HttpRequest) -> Result<HttpResponse, BoxError> {
    Ok(HttpResponse::json(&json!({ "message": PONG }))?)
}

pub fn handler() -> RegistrationResult<Handler> {
    Handler::builder("ping")
        .route(
            Route::new(r"(?i)ping$", "respond_to_ping", respond_to_ping)?
                .command(true)
                .help("ping", "Pongs back if the robot is awake and listening."),
        )
        .http(HttpRoute::get("/ping", http_ping)?)
        .build()
}

#[cfg(test)]
mod tests {
    use pewter::framework::{HttpMethod, HttpRouter, Reply, RouteTable};

    use super::*;
    use crate::handlers::harness;

    #[tokio::test]
    async fn test_ping_pongs() {
        let handler = Arc::new(handler().unwrap());
        let replies = harness::send(&handler, &harness::users(), "ping").await;
        assert_eq!(replies, vec![Reply::Public(vec![PONG.to_string()])]);
    }

    #[tokio::test]
    async fn test_http_ping() {
        let handler = handler().unwrap();
        let table = RouteTable::new();
        for route in handler.http_routes() {
            table.mount(handler.namespace(), route.clone());
        }

        let response = table.call(HttpMethod::Get, HttpRequest::new("/ping")).await;
        assert_eq!(response.status, 200);
        let body: serde_json::Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body["message"], PONG);
    }
}
