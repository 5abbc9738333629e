//! HTTP surface: daemon-notify callbacks and the availability status
//! endpoint. Hosts mount [`configure`] into their actix `App`.

pub mod callbacks;
pub mod status;

use std::sync::Arc;

use actix_web::web;

use monero_gateway_common::EventBus;
use monero_gateway_wallet::MoneroRpcProvider;

pub fn configure(
    cfg: &mut web::ServiceConfig,
    bus: EventBus,
    provider: Arc<MoneroRpcProvider>,
) {
    cfg.app_data(web::Data::new(bus))
        .app_data(web::Data::new(provider))
        .service(callbacks::on_block_notify)
        .service(callbacks::on_transaction_notify)
        .service(status::summary_status);
}
