use crate::error::Result;
use crate::models::{DuePayments, MonthlyDuePayments, Payment, PaymentSummary, Unit, UnitPatch};
use crate::services::types::UnitFilters;
use crate::services::units::ImageUpload;
use async_trait::async_trait;

/// Payment operations of the rental backend
/// Lets callers swap the HTTP client for a fake in tests
#[async_trait]
pub trait PaymentApi: Send + Sync {
    /// Payments the current user still owes
    async fn get_due_payments(&self) -> Result<DuePayments>;

    /// Request the PENDING -> PAID transition for one payment
    async fn mark_payment_as_paid(&self, payment_id: &str) -> Result<Payment>;

    async fn get_due_payments_this_month(&self) -> Result<MonthlyDuePayments>;

    async fn get_payment_summary(&self) -> Result<PaymentSummary>;
}

/// Unit listing operations of the rental backend
#[async_trait]
pub trait UnitApi: Send + Sync {
    /// Units owned by the current user
    async fn get_units(&self, filters: Option<&UnitFilters>) -> Result<Vec<Unit>>;

    async fn create_unit(&self, unit: &Unit, images: &[ImageUpload]) -> Result<Unit>;

    async fn update_unit(&self, id: &str, patch: &UnitPatch, images: &[ImageUpload]) -> Result<Unit>;
}
