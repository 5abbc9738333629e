//! Daemon notify hooks.
//!
//! monerod is started with `--block-notify`/`--tx-notify` scripts that hit
//! these endpoints. They are best-effort triggers: no body, no auth beyond
//! network placement (trusted localhost), always 200 so the shell hook
//! never retries.

use actix_web::{get, web, HttpResponse, Responder};
use serde::Deserialize;

use monero_gateway_common::{EventBus, MoneroEvent};

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub hash: String,
    #[serde(rename = "cryptoCode")]
    pub crypto_code: String,
}

#[get("/monerolikedaemoncallback/block")]
pub async fn on_block_notify(
    query: web::Query<CallbackQuery>,
    bus: web::Data<EventBus>,
) -> impl Responder {
    bus.publish_monero(MoneroEvent::BlockNotify {
        crypto_code: query.crypto_code.to_uppercase(),
        hash: query.hash.clone(),
    });
    HttpResponse::Ok().finish()
}

#[get("/monerolikedaemoncallback/tx")]
pub async fn on_transaction_notify(
    query: web::Query<CallbackQuery>,
    bus: web::Data<EventBus>,
) -> impl Responder {
    bus.publish_monero(MoneroEvent::TxNotify {
        crypto_code: query.crypto_code.to_uppercase(),
        hash: query.hash.clone(),
    });
    HttpResponse::Ok().finish()
}
