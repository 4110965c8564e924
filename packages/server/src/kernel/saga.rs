//! Ordered step list with compensation.
//!
//! Each step pairs a forward action with an optional compensating action.
//! Steps run in order; each commits on its own. When a forward action fails,
//! the compensations of the steps that already completed run in reverse order
//! and the original error is returned as `CoreError::SagaStepFailure`.
//!
//! Compensation is best-effort: a failing compensation is logged and the
//! rollback carries on with the remaining steps. Such a failure can leave
//! partial state behind.

use std::future::Future;

use anyhow::Result;
use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{debug, error, warn};

use crate::common::CoreError;

type Action = Box<dyn FnOnce() -> BoxFuture<'static, Result<()>> + Send>;

struct Step {
    name: &'static str,
    forward: Action,
    compensate: Option<Action>,
}

fn boxed<F, Fut>(f: F) -> Action
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Box::new(move || f().boxed())
}

pub struct Saga {
    name: &'static str,
    steps: Vec<Step>,
}

impl Saga {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            steps: Vec::new(),
        }
    }

    pub fn step<F, Fut, C, CFut>(mut self, name: &'static str, forward: F, compensate: C) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
        C: FnOnce() -> CFut + Send + 'static,
        CFut: Future<Output = Result<()>> + Send + 'static,
    {
        self.steps.push(Step {
            name,
            forward: boxed(forward),
            compensate: Some(boxed(compensate)),
        });
        self
    }

    /// A step with nothing to undo (typically the last one).
    pub fn final_step<F, Fut>(mut self, name: &'static str, forward: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.steps.push(Step {
            name,
            forward: boxed(forward),
            compensate: None,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub async fn run(self) -> Result<(), CoreError> {
        let saga = self.name;
        let mut completed: Vec<(&'static str, Option<Action>)> = Vec::with_capacity(self.steps.len());

        for step in self.steps {
            debug!(saga, step = step.name, "saga step starting");
            match (step.forward)().await {
                Ok(()) => completed.push((step.name, step.compensate)),
                Err(source) => {
                    error!(saga, step = step.name, error = %source, "saga step failed, compensating");
                    compensate(saga, completed).await;
                    return Err(CoreError::SagaStepFailure {
                        saga,
                        step: step.name,
                        source,
                    });
                }
            }
        }

        Ok(())
    }
}

async fn compensate(saga: &'static str, completed: Vec<(&'static str, Option<Action>)>) {
    for (step, action) in completed.into_iter().rev() {
        let Some(action) = action else { continue };
        match action().await {
            Ok(()) => debug!(saga, step, "compensated"),
            Err(e) => warn!(saga, step, error = %e, "compensation failed, continuing rollback"),
        }
    }
}
