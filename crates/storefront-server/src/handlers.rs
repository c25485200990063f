//! HTTP Handlers

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use checkout_core::{
    CartSummary, CartUpdate, CheckoutError, FinancingLaunch, FinancingRequest, GatewayError,
    LineItem, NewLineItem,
};

use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub financing_configured: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse { error: error.into() }))
}

#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub items: Vec<LineItem>,
    pub summary: CartSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QuantityRequest {
    pub quantity: i64,
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        financing_configured: state.financing.is_some(),
    })
}

/// Launch a financing application with the partner
pub async fn launch_financing(
    State(state): State<AppState>,
    payload: Result<Json<FinancingRequest>, JsonRejection>,
) -> Result<Json<FinancingLaunch>, ApiError> {
    let Some(gateway) = state.financing.as_ref() else {
        tracing::error!("Financing launch requested but credentials are not configured");
        return Err(api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Financing credentials not configured",
        ));
    };

    let Json(request) = payload.map_err(|e| {
        tracing::warn!(error = %e, "Malformed launch request");
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to launch financing: {}", e.body_text()),
        )
    })?;

    let launch = gateway.launch(&request).await.map_err(|e| {
        tracing::error!(order_id = %request.order_id, error = %e, "Financing launch failed");
        launch_error(e)
    })?;

    Ok(Json(launch))
}

fn launch_error(error: CheckoutError) -> ApiError {
    match error {
        CheckoutError::Gateway(GatewayError::Status { status, message }) => api_error(
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            format!("Financing API error: {message}"),
        ),
        CheckoutError::Gateway(e @ (GatewayError::Protocol(_) | GatewayError::Timeout(_))) => {
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        CheckoutError::Validation(errors) => {
            api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("Invalid launch request: {errors}"))
        }
        other => api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to launch financing: {other}"),
        ),
    }
}

fn cart_response(state: &AppState, update: CartUpdate) -> Json<CartResponse> {
    let summary = CartSummary::of(&update.items, &state.tax_policy);
    Json(CartResponse {
        items: update.items,
        summary,
        warning: update.warning,
    })
}

pub async fn get_cart(State(state): State<AppState>) -> Json<CartResponse> {
    let update = state.cart.get();
    cart_response(&state, update)
}

pub async fn add_cart_item(
    State(state): State<AppState>,
    Json(item): Json<NewLineItem>,
) -> Json<CartResponse> {
    tracing::debug!(id = %item.id, sku = %item.sku, "Adding cart item");
    let update = state.cart.add(item);
    cart_response(&state, update)
}

pub async fn set_cart_quantity(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<QuantityRequest>,
) -> Json<CartResponse> {
    let update = state.cart.set_quantity(&id, body.quantity);
    cart_response(&state, update)
}

pub async fn remove_cart_item(State(state): State<AppState>, Path(id): Path<String>) -> Json<CartResponse> {
    let update = state.cart.remove(&id);
    cart_response(&state, update)
}

pub async fn clear_cart(State(state): State<AppState>) -> Json<CartResponse> {
    let update = state.cart.clear();
    cart_response(&state, update)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Request, header},
    };
    use checkout_core::{CartStore, MemoryKeyValueStore, TaxPolicy};
    use checkout_financing::{FinancingClient, FinancingConfig};
    use rust_decimal_macros::dec;
    use serde_json::{Value, json};
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn state(financing: Option<Arc<dyn checkout_core::FinancingGateway>>) -> AppState {
        AppState {
            financing,
            cart: Arc::new(CartStore::new(Arc::new(MemoryKeyValueStore::new()))),
            tax_policy: TaxPolicy::default(),
        }
    }

    fn partner_state(server: &MockServer) -> AppState {
        let client = FinancingClient::new(FinancingConfig::new(server.uri(), "user", "pass")).unwrap();
        state(Some(Arc::new(client)))
    }

    fn launch_body() -> Value {
        json!({
            "orderId": "ORD-1700000000000-ABCDEFGHI",
            "totalAmount": 1199.96,
            "subtotal": 1199.96,
            "tax": 0.0,
            "fees": 0.0,
            "shipping": 0.0,
            "customer": {
                "firstName": "Jane", "lastName": "Doe", "email": "jane@example.com",
                "mobilePhone": "5551234567", "streetAddress": "1 Main St",
                "city": "Erie", "state": "PA", "zipCode": "16501"
            },
            "items": [{ "name": "Michelin Defender - 225/65R17", "price": 299.99, "quantity": 4 }]
        })
    }

    async fn send(app: Router, verb: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(verb).uri(uri);
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    #[tokio::test]
    async fn test_health_reports_financing() {
        let (status, body) = send(crate::app(state(None)), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["financingConfigured"], false);
    }

    #[tokio::test]
    async fn test_launch_without_credentials() {
        let (status, body) = send(crate::app(state(None)), "POST", "/api/financing/launch", Some(launch_body())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Financing credentials not configured");
    }

    #[tokio::test]
    async fn test_launch_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/page/api-launch"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "launchURL": "https://apply.partner.test/s/1", "application": { "applicationId": "A-1" } }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (status, body) =
            send(crate::app(partner_state(&server)), "POST", "/api/financing/launch", Some(launch_body())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "launchURL": "https://apply.partner.test/s/1", "applicationId": "A-1" }));
    }

    #[tokio::test]
    async fn test_upstream_status_passthrough() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string(r#"{"message":"bad credentials"}"#))
            .mount(&server)
            .await;

        let (status, body) =
            send(crate::app(partner_state(&server)), "POST", "/api/financing/launch", Some(launch_body())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], r#"Financing API error: {"message":"bad credentials"}"#);
    }

    #[tokio::test]
    async fn test_missing_launch_url_is_500() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": {} })))
            .mount(&server)
            .await;

        let (status, body) =
            send(crate::app(partner_state(&server)), "POST", "/api/financing/launch", Some(launch_body())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("No launchURL"));
    }

    #[tokio::test]
    async fn test_invalid_shape_never_reaches_partner() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

        let mut body = launch_body();
        body["items"] = json!([]);
        let (status, body) = send(crate::app(partner_state(&server)), "POST", "/api/financing/launch", Some(body)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("items"));
    }

    #[tokio::test]
    async fn test_cart_endpoints() {
        let app = crate::app(state(None));
        let tire = json!({
            "id": "t1", "type": "tire", "brand": "Michelin", "model": "Defender",
            "sku": "T1", "price": 299.99, "image": "/img/t1.png"
        });

        send(app.clone(), "POST", "/api/cart/items", Some(tire.clone())).await;
        let (status, body) = send(app.clone(), "POST", "/api/cart/items", Some(tire)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["items"].as_array().unwrap().len(), 1);
        assert_eq!(body["items"][0]["quantity"], 2);

        let (_, body) = send(app.clone(), "PATCH", "/api/cart/items/t1", Some(json!({ "quantity": 4 }))).await;
        assert_eq!(body["summary"]["itemCount"], 4);
        assert_eq!(body["summary"]["totals"]["subtotal"], json!(1199.96));
        assert_eq!(body["summary"]["totals"]["total"], json!(1199.96));

        let (_, body) = send(app.clone(), "PATCH", "/api/cart/items/t1", Some(json!({ "quantity": 0 }))).await;
        assert!(body["items"].as_array().unwrap().is_empty());

        let (_, body) = send(app, "GET", "/api/cart", None).await;
        assert!(body["items"].as_array().unwrap().is_empty());
        assert!(body.get("warning").is_none());
    }

    #[tokio::test]
    async fn test_cart_summary_uses_tax_policy() {
        let mut taxed = state(None);
        taxed.tax_policy = TaxPolicy::new(dec!(0.08));
        let app = crate::app(taxed);

        let wheel = json!({
            "id": "w1", "type": "wheel", "brand": "Fuel", "model": "Rebel", "sku": "W1", "price": 100.05
        });
        let (_, body) = send(app.clone(), "POST", "/api/cart/items", Some(wheel)).await;
        assert_eq!(body["summary"]["totals"]["tax"], json!(8.0));
        assert_eq!(body["summary"]["totals"]["total"], json!(108.05));

        let (_, body) = send(app, "DELETE", "/api/cart", None).await;
        assert_eq!(body["summary"]["itemCount"], 0);
    }
}
