//! Kernel module - client infrastructure and dependencies.

pub mod api_client;
pub mod credential_store;
pub mod deps;
pub mod test_dependencies;
pub mod traits;

pub use api_client::{
    ApiError, HttpBackendApi, InviteCodeCheck, LoginRequest, PaymentOrder, PaymentRequest,
    PhoneCheck, RegisterRequest, SettlementStatus, StatusSnapshot, WalletBalance,
};
pub use credential_store::FileCredentialStore;
pub use deps::{ApiWalletService, ClientDeps, StaticLocationService, WagateAdapter};
pub use test_dependencies::TestDependencies;
pub use traits::*;
