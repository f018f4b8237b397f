use std::fmt;
use std::sync::Arc;

/// Shared, immutable transform behind every pipeline and builder
type Action<I, O, E> = Arc<dyn Fn(I) -> Result<O, E> + Send + Sync>;

/// A named, composable unit of work mapping an `I` to an `O`.
///
/// A pipeline is created from a single function with [`Pipeline::from_fn`] or
/// [`Pipeline::new`], or step by step through [`Pipeline::builder`]. Pipelines
/// are values: joining two with [`Pipeline::then`] or cloning one never
/// touches the originals, and the wrapped action cannot be replaced.
///
/// The name is only used for diagnostics. Errors are whatever the wrapped
/// transforms return and reach the caller of [`Pipeline::execute`] as is.
pub struct Pipeline<I, O, E = anyhow::Error> {
    name: String,
    action: Action<I, O, E>,
}

impl<I, O, E> Pipeline<I, O, E>
where
    I: 'static,
    O: 'static,
    E: 'static,
{
    /// Create a pipeline from a fallible transform
    pub fn new<F>(name: impl Into<String>, action: F) -> Self
    where
        F: Fn(I) -> Result<O, E> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            action: Arc::new(action),
        }
    }

    /// Create a pipeline from a transform that cannot fail
    pub fn from_fn<F>(name: impl Into<String>, action: F) -> Self
    where
        F: Fn(I) -> O + Send + Sync + 'static,
    {
        Self::new(name, move |input: I| Ok(action(input)))
    }

    /// Run the transform on `input`
    pub fn execute(&self, input: I) -> Result<O, E> {
        (self.action)(input)
    }

    /// Diagnostic name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Feed the output of this pipeline into `next`.
    ///
    /// The result is named `"<self> -> <next>"`. Names are joined flat, so
    /// `a.then(&b).then(&c)` and `a.then(&b.then(&c))` are both `"a -> b -> c"`.
    pub fn then<R>(&self, next: &Pipeline<O, R, E>) -> Pipeline<I, R, E>
    where
        R: 'static,
    {
        let first = Arc::clone(&self.action);
        let second = Arc::clone(&next.action);
        Pipeline {
            name: format!("{} -> {}", self.name, next.name),
            action: Arc::new(move |input: I| -> Result<R, E> { second(first(input)?) }),
        }
    }
}

impl<I, E> Pipeline<I, I, E>
where
    I: 'static,
    E: 'static,
{
    /// Start an incremental builder whose transform is the identity on `I`
    pub fn builder(name: impl Into<String>) -> PipelineBuilder<I, I, E> {
        PipelineBuilder {
            name: name.into(),
            steps: Vec::new(),
            composed: Arc::new(|input: I| Ok(input)),
        }
    }
}

impl<I, O, E> Clone for Pipeline<I, O, E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            action: Arc::clone(&self.action),
        }
    }
}

impl<I, O, E> fmt::Debug for Pipeline<I, O, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline").field("name", &self.name).finish()
    }
}

/// Persistent accumulator of named steps.
///
/// Every `add_step`/`try_step` call returns a new builder and leaves `self`
/// untouched, so a common prefix can be extended in several directions.
/// The output type `O` follows the last step; a step whose input does not
/// match the previous output is rejected by the compiler.
pub struct PipelineBuilder<I, O, E = anyhow::Error> {
    name: String,
    steps: Vec<String>,
    composed: Action<I, O, E>,
}

impl<I, O, E> PipelineBuilder<I, O, E>
where
    I: 'static,
    O: 'static,
    E: 'static,
{
    /// Append a step that cannot fail
    pub fn add_step<R, F>(&self, step_name: impl Into<String>, step: F) -> PipelineBuilder<I, R, E>
    where
        R: 'static,
        F: Fn(O) -> R + Send + Sync + 'static,
    {
        self.try_step(step_name, move |value: O| Ok::<R, E>(step(value)))
    }

    /// Append a fallible step; its error is converted into the pipeline error
    pub fn try_step<R, E2, F>(
        &self,
        step_name: impl Into<String>,
        step: F,
    ) -> PipelineBuilder<I, R, E>
    where
        R: 'static,
        E2: Into<E> + 'static,
        F: Fn(O) -> Result<R, E2> + Send + Sync + 'static,
    {
        let previous = Arc::clone(&self.composed);
        let mut steps = self.steps.clone();
        steps.push(step_name.into());

        PipelineBuilder {
            name: self.name.clone(),
            steps,
            composed: Arc::new(move |input: I| -> Result<R, E> {
                step(previous(input)?).map_err(Into::into)
            }),
        }
    }

    /// Names of the steps added so far, in order
    pub fn step_names(&self) -> &[String] {
        &self.steps
    }

    /// Finish into a pipeline carrying the builder's name
    pub fn build(&self) -> Pipeline<I, O, E> {
        Pipeline {
            name: self.name.clone(),
            action: Arc::clone(&self.composed),
        }
    }
}

impl<I, O, E> Clone for PipelineBuilder<I, O, E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            steps: self.steps.clone(),
            composed: Arc::clone(&self.composed),
        }
    }
}

impl<I, O, E> fmt::Debug for PipelineBuilder<I, O, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("name", &self.name)
            .field("steps", &self.steps)
            .finish()
    }
}
