pub mod aggregation_service;
pub mod manual_service;
pub mod metrics_service;
pub mod portfolio_service;
pub mod price_service;
pub mod snapshot_service;
