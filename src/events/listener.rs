use async_trait::async_trait;

use super::TeamEvent;

/// Receives team events after they are committed.
///
/// # Example
///
/// ```rust,ignore
/// use teamgate::events::{Listener, TeamEvent};
/// use async_trait::async_trait;
///
/// struct AuditTrail {
///     pool: sqlx::PgPool,
/// }
///
/// #[async_trait]
/// impl Listener for AuditTrail {
///     async fn handle(&self, event: &TeamEvent) {
///         if let TeamEvent::OwnershipTransferred { team_id, from, to, .. } = event {
///             // write an audit row
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Listener: Send + Sync + 'static {
    /// Called for every dispatched event. Match on the variant to filter.
    async fn handle(&self, event: &TeamEvent);
}
