// REST API client
//
// Bearer-authenticated JSON API under `/api/v1`. Only the read paths and
// alert transitions the sync layer needs are covered.

pub mod client;
pub mod models;

mod alerts;
mod devices;
mod gateways;
mod sensor_data;
mod sites;
mod stats;

pub use client::RestClient;
