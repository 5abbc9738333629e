//! Per-currency availability status for dashboards and store settings UI.

use std::sync::Arc;

use actix_web::{get, web, HttpResponse, Responder};
use serde::Serialize;

use monero_gateway_common::MoneroSummary;
use monero_gateway_wallet::MoneroRpcProvider;

#[derive(Serialize)]
struct StatusResponse {
    crypto_code: String,
    usable: bool,
    summary: MoneroSummary,
}

/// `GET /status/{cryptoCode}` - 404 for unknown currencies, otherwise the
/// latest summary snapshot.
#[get("/status/{crypto_code}")]
pub async fn summary_status(
    path: web::Path<String>,
    provider: web::Data<Arc<MoneroRpcProvider>>,
) -> impl Responder {
    let crypto_code = path.into_inner().to_uppercase();
    if !provider.is_configured(&crypto_code) {
        return HttpResponse::NotFound().finish();
    }
    let summary = provider
        .summary(&crypto_code)
        .map(|s| (*s).clone())
        .unwrap_or_default();
    HttpResponse::Ok().json(StatusResponse {
        usable: summary.usable(),
        crypto_code,
        summary,
    })
}
