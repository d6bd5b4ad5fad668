//! Job Store implementations.
//!
//! ```ignore
//! let store: Arc<dyn JobStore> = Arc::new(SeaOrmJobStore::new(database.connection()));
//! store.create(InvocationJob::new("summarizer", false)).await?;
//! ```

pub mod job_store_memory;
pub mod job_store_seaorm;
pub mod traits;

pub use job_store_memory::InMemoryJobStore;
pub use job_store_seaorm::SeaOrmJobStore;
pub use traits::{JobListFilter, JobStore};
