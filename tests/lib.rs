// Test library for access-layer behavior tests
pub use sedori_core::{
    AccessError, Asin, BatchOrchestrator, BatchRun, ItemOutcome, JanCode, ProductCode,
    ProviderId, ProviderPolicy, RateGate, RequestExecutor, RunStatus, TokenBudgetGuard,
};
pub use std::sync::Arc;
