pub mod credentials;
pub mod holding;
pub mod manual;
pub mod metrics;
pub mod price;
pub mod response;
pub mod settings;
pub mod snapshot;
pub mod source;
