/// Database models for Tempo
///
/// This module contains all database models and their CRUD operations.
///
/// # Models
///
/// - `task`: Calendar tasks with counter-minted sequential identifiers
/// - `user`: User accounts, subscription state, and registration codes
/// - `notification`: Persisted notification records (CRUD-only subsystem)
/// - `push_subscription`: Stored browser push-subscription objects
///
/// # Example
///
/// ```no_run
/// use tempo_shared::models::task::{Task, CreateTask};
/// use tempo_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let task = Task::create(&pool, CreateTask {
///     title: "Pay rent".to_string(),
///     ..Default::default()
/// }).await?;
/// # Ok(())
/// # }
/// ```

pub mod notification;
pub mod push_subscription;
pub mod task;
pub mod user;
