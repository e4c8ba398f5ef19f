pub mod config;
pub mod error;
pub mod domain {
    pub mod amount;
    pub mod ledger;
    pub mod payment;
}
pub mod gateway;
pub mod bus;
pub mod idempotency;
pub mod outbox;
pub mod repo;
pub mod service {
    pub mod compensation;
    pub mod orchestrator;
    pub mod outbox_relay;
}
