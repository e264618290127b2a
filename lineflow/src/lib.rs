//! # Lineflow
//!
//! A pipeline execution kernel: ordered stages run either as a chain or as
//! independent concurrent tasks, with lifecycle tracking and progress events.
//!
//! Lineflow provides:
//!
//! - **Sequential orchestration**: each stage's output feeds the next stage,
//!   and a failure rolls back the stages that already completed
//! - **Parallel orchestration**: every stage gets the same input and results
//!   are collected as they arrive
//! - **Lifecycle tracking**: `Created -> Running -> Completed | Failed | Cancelled`
//!   persisted through a [`ports::PipelineRepository`]
//! - **Progress events**: every status change is pushed to an
//!   [`events::EventBroadcaster`]
//! - **Cooperative cancellation**: a cancel request is observed between
//!   sequential stages and interrupts in-flight parallel stages
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use lineflow::prelude::*;
//!
//! let repository = Arc::new(InMemoryRepository::new());
//! let user_id = repository.save_user(User::new("Ada", "ada@example.com"));
//! let service = PipelineService::new(repository, Arc::new(LoggingBroadcaster::default()));
//!
//! let pipeline_id = service
//!     .create_pipeline(user_id, 3, ExecutionMode::Sequential)
//!     .await?;
//! let report = service
//!     .start_pipeline(&RunContext::new(), user_id, pipeline_id, json!({"order": 42}))
//!     .await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod context;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod orchestrator;
pub mod ports;
pub mod service;
pub mod stages;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{EvictionPolicy, KernelConfig, RollbackOrder};
    pub use crate::context::{RunContext, StageContext};
    pub use crate::core::{
        ExecutionLogEntry, ExecutionMode, LogStatus, PipelineEvent, PipelineRecord,
        PipelineStatus, User,
    };
    pub use crate::errors::{KernelError, RepositoryError, StageFailure};
    pub use crate::events::{
        ChannelBroadcaster, CollectingBroadcaster, EventBroadcaster, LoggingBroadcaster,
        NoOpBroadcaster,
    };
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::orchestrator::{ExecutionReport, Orchestrator};
    pub use crate::ports::{InMemoryRepository, PipelineRepository};
    pub use crate::service::{PipelineRegistry, PipelineService};
    pub use crate::stages::{BaseStage, FnStage, Stage, StageError};
}

pub use errors::{KernelError, Result};
pub use service::PipelineService;

#[cfg(test)]
mod tests {
    use crate::prelude::*;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_prelude_quick_start() {
        let repository = Arc::new(InMemoryRepository::new());
        let user_id = repository.save_user(User::new("Ada", "ada@example.com"));
        let service = PipelineService::new(repository, Arc::new(NoOpBroadcaster));

        let pipeline_id = service
            .create_pipeline(user_id, 3, ExecutionMode::Sequential)
            .await
            .unwrap();
        let report = service
            .start_pipeline(&RunContext::new(), user_id, pipeline_id, json!({"order": 42}))
            .await
            .unwrap();

        assert_eq!(report.output, json!({"order": 42}));
        assert_eq!(
            service.get_pipeline_status(pipeline_id).await.unwrap(),
            PipelineStatus::Completed
        );
    }
}
