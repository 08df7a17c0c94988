//! Source registry mapping webhook providers to verifiers and tasks.
//!
//! The registry is built once at startup from explicit registrations and
//! never mutated afterwards. Intake handlers resolve sources through it,
//! and workers resolve task routing keys back to processing logic.

use std::{collections::HashMap, sync::Arc};

use crate::{
    error::{IntakeError, Result},
    models::TaskRef,
    task::ProcessingTask,
    verify::Verifier,
};

/// One source registration handed to [`SourceRegistry::build`].
pub struct SourceRegistration {
    /// Source identifier as it appears in the intake URL path.
    pub source: String,

    /// Verification strategy for this source's requests.
    pub verifier: Verifier,

    /// Processing task this source's payloads are routed to.
    pub task: Arc<dyn ProcessingTask>,
}

impl SourceRegistration {
    /// Creates a registration for a source.
    pub fn new(
        source: impl Into<String>,
        verifier: Verifier,
        task: Arc<dyn ProcessingTask>,
    ) -> Self {
        Self { source: source.into(), verifier, task }
    }
}

/// Resolved registry entry for one source.
#[derive(Debug, Clone)]
pub struct SourceEntry {
    /// Verification strategy for this source.
    pub verifier: Verifier,

    /// Routing key of this source's processing task.
    pub task: TaskRef,
}

/// Immutable mapping from sources to verification and processing.
///
/// Holds two indexes over the same registrations: sources by identifier
/// for the intake path, and tasks by routing key for workers and replay.
#[derive(Debug)]
pub struct SourceRegistry {
    sources: HashMap<String, SourceEntry>,
    tasks: HashMap<TaskRef, Arc<dyn ProcessingTask>>,
}

impl SourceRegistry {
    /// Builds the registry from explicit registrations.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateSource` if two registrations name the same
    /// source. Startup fails rather than letting one registration
    /// silently shadow another.
    pub fn build(registrations: Vec<SourceRegistration>) -> Result<Self> {
        let mut sources = HashMap::new();
        let mut tasks = HashMap::new();

        for registration in registrations {
            let task_ref = registration.task.task_ref();

            let entry = SourceEntry {
                verifier: registration.verifier,
                task: task_ref.clone(),
            };
            if sources.insert(registration.source.clone(), entry).is_some() {
                return Err(IntakeError::DuplicateSource { source: registration.source });
            }

            // Two sources may legitimately share one task
            tasks.insert(task_ref, registration.task);
        }

        Ok(Self { sources, tasks })
    }

    /// Looks up the entry for a source.
    ///
    /// # Errors
    ///
    /// Returns `UnknownSource` if the source is not registered.
    pub fn entry(&self, source: &str) -> Result<&SourceEntry> {
        self.sources
            .get(source)
            .ok_or_else(|| IntakeError::UnknownSource { source: source.to_string() })
    }

    /// Resolves a task routing key to its processing task.
    ///
    /// # Errors
    ///
    /// Returns `UnknownTask` if no task is registered under the key.
    pub fn task(&self, task: &TaskRef) -> Result<Arc<dyn ProcessingTask>> {
        self.tasks
            .get(task)
            .cloned()
            .ok_or_else(|| IntakeError::UnknownTask { task: task.to_string() })
    }

    /// Registered source identifiers, for startup logging.
    pub fn source_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.sources.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use std::{future::Future, pin::Pin};

    use serde_json::Value;

    use super::*;
    use crate::task::TaskOutcome;

    struct NoopTask {
        name: &'static str,
    }

    impl ProcessingTask for NoopTask {
        fn task_ref(&self) -> TaskRef {
            TaskRef::from(self.name)
        }

        fn execute(
            &self,
            _payload: Value,
        ) -> Pin<Box<dyn Future<Output = TaskOutcome> + Send + '_>> {
            Box::pin(async { TaskOutcome::Success })
        }
    }

    fn registration(source: &str, task: &'static str) -> SourceRegistration {
        SourceRegistration::new(
            source,
            Verifier::TokenPresence { header: "x-signature".into() },
            Arc::new(NoopTask { name: task }),
        )
    }

    #[test]
    fn resolves_registered_source_and_task() {
        let registry = SourceRegistry::build(vec![
            registration("github", "process_github_webhook"),
            registration("stripe", "process_stripe_webhook"),
        ])
        .unwrap();

        let entry = registry.entry("github").unwrap();
        assert_eq!(entry.task, TaskRef::from("process_github_webhook"));

        let task = registry.task(&entry.task).unwrap();
        assert_eq!(task.task_ref(), TaskRef::from("process_github_webhook"));
    }

    #[test]
    fn rejects_duplicate_source() {
        let err = SourceRegistry::build(vec![
            registration("github", "process_github_webhook"),
            registration("github", "other_task"),
        ])
        .unwrap_err();

        assert!(matches!(err, IntakeError::DuplicateSource { source } if source == "github"));
    }

    #[test]
    fn unknown_source_is_an_error() {
        let registry =
            SourceRegistry::build(vec![registration("github", "process_github_webhook")]).unwrap();

        let err = registry.entry("gitlab").unwrap_err();
        assert!(matches!(err, IntakeError::UnknownSource { source } if source == "gitlab"));
    }

    #[test]
    fn unknown_task_is_an_error() {
        let registry = SourceRegistry::build(Vec::new()).unwrap();

        let err = registry.task(&TaskRef::from("missing_task")).unwrap_err();
        assert!(matches!(err, IntakeError::UnknownTask { task } if task == "missing_task"));
    }

    #[test]
    fn source_names_are_sorted() {
        let registry = SourceRegistry::build(vec![
            registration("stripe", "process_stripe_webhook"),
            registration("github", "process_github_webhook"),
        ])
        .unwrap();

        assert_eq!(registry.source_names(), vec!["github", "stripe"]);
    }
}
