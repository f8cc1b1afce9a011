//! Stage traits and the generic runner that chains them.
//!
//! A pipeline is a feature stage (usually a [`Chain`] of transformers)
//! followed by one estimator. Every stage is fit in order on the output of
//! the stage before it; prediction replays the fitted transforms and then
//! asks the estimator.

use crate::error::Result;
use crate::matrix::LabelMatrix;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

/// A named pipeline stage.
pub trait Stage {
    /// Stage name used in logs and reports.
    fn name(&self) -> &'static str;

    /// Names of the leaf stages, in execution order.
    fn stage_names(&self) -> Vec<&'static str> {
        vec![self.name()]
    }
}

/// A stage that learns state from its input and then maps inputs to outputs.
pub trait Transformer<In: ?Sized>: Stage {
    type Output;

    fn fit(&mut self, input: &In) -> Result<()>;

    fn transform(&self, input: &In) -> Result<Self::Output>;

    fn fit_transform(&mut self, input: &In) -> Result<Self::Output> {
        self.fit(input)?;
        self.transform(input)
    }
}

/// The final stage: learns from features plus targets, predicts labels.
pub trait Estimator<In: ?Sized>: Stage {
    fn fit(&mut self, features: &In, targets: &LabelMatrix) -> Result<()>;

    fn predict(&self, features: &In) -> Result<LabelMatrix>;
}

/// Two transformers run back to back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chain<A, B> {
    first: A,
    second: B,
}

impl<A, B> Chain<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }

    pub fn first(&self) -> &A {
        &self.first
    }

    pub fn second(&self) -> &B {
        &self.second
    }
}

impl<A: Stage, B: Stage> Stage for Chain<A, B> {
    fn name(&self) -> &'static str {
        "chain"
    }

    fn stage_names(&self) -> Vec<&'static str> {
        let mut names = self.first.stage_names();
        names.extend(self.second.stage_names());
        names
    }
}

impl<In, A, B> Transformer<In> for Chain<A, B>
where
    In: ?Sized,
    A: Transformer<In>,
    B: Transformer<A::Output>,
{
    type Output = B::Output;

    fn fit(&mut self, input: &In) -> Result<()> {
        let mid = timed_fit_transform(&mut self.first, input)?;
        timed(self.second.name(), || self.second.fit(&mid))
    }

    fn transform(&self, input: &In) -> Result<Self::Output> {
        let mid = self.first.transform(input)?;
        self.second.transform(&mid)
    }

    fn fit_transform(&mut self, input: &In) -> Result<Self::Output> {
        let mid = timed_fit_transform(&mut self.first, input)?;
        timed_fit_transform(&mut self.second, &mid)
    }
}

/// Feature stage plus estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline<T, E> {
    features: T,
    estimator: E,
}

impl<T, E> Pipeline<T, E> {
    pub fn new(features: T, estimator: E) -> Self {
        Self {
            features,
            estimator,
        }
    }

    pub fn features(&self) -> &T {
        &self.features
    }

    pub fn estimator(&self) -> &E {
        &self.estimator
    }
}

impl<T: Stage, E: Stage> Pipeline<T, E> {
    /// Every leaf stage name, features first.
    pub fn stage_names(&self) -> Vec<&'static str> {
        let mut names = self.features.stage_names();
        names.push(self.estimator.name());
        names
    }
}

impl<T, E> Pipeline<T, E> {
    /// Fit every stage in order.
    pub fn fit<In>(&mut self, input: &In, targets: &LabelMatrix) -> Result<()>
    where
        In: ?Sized,
        T: Transformer<In>,
        E: Estimator<T::Output>,
    {
        let features = timed_fit_transform(&mut self.features, input)?;
        let estimator = &mut self.estimator;
        timed(estimator.name(), || estimator.fit(&features, targets))
    }

    /// Run the fitted transforms and predict.
    pub fn predict<In>(&self, input: &In) -> Result<LabelMatrix>
    where
        In: ?Sized,
        T: Transformer<In>,
        E: Estimator<T::Output>,
    {
        let features = self.features.transform(input)?;
        self.estimator.predict(&features)
    }
}

fn timed_fit_transform<In, S>(stage: &mut S, input: &In) -> Result<S::Output>
where
    In: ?Sized,
    S: Transformer<In>,
{
    // Chains log their own leaves.
    if stage.stage_names().len() > 1 {
        return stage.fit_transform(input);
    }
    let name = stage.name();
    timed(name, || stage.fit_transform(input))
}

fn timed<R>(name: &'static str, f: impl FnOnce() -> Result<R>) -> Result<R> {
    let start = Instant::now();
    let out = f()?;
    info!(
        stage = name,
        duration_ms = start.elapsed().as_millis() as u64,
        "Fitted stage"
    );
    Ok(out)
}
