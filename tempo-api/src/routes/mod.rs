/// API route handlers
///
/// # Modules
///
/// - `health`: Health check endpoint
/// - `auth`: Registration, login, and profile endpoints
/// - `tasks`: Task CRUD with scheduler hooks
/// - `notifications`: SSE stream and persisted notification CRUD
/// - `push`: Browser push-subscription pass-through
/// - `billing`: Billing provider webhook

pub mod auth;
pub mod billing;
pub mod health;
pub mod notifications;
pub mod push;
pub mod tasks;
