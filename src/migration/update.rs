//! # Update Requests
//!
//! An update comes in one of three shapes: static update data, a single
//! field/value pair, or a per-document getter, each with an optional predicate.
//! [`UpdateRequest`] is the closed set of those shapes; [`resolve_update_args`]
//! builds one from loosely typed positional arguments using the rule:
//!
//! 1. a callable first argument is the getter form;
//! 2. otherwise exactly two arguments with a non-callable second is the
//!    field/value form (three arguments ending in a predicate are accepted too);
//! 3. anything else is the static-data form.
//!
//! Either way the request is resolved once into a [`DocumentMutation`], the only
//! thing the traversal handler ever sees.

use super::document::{Document, FieldPath, UpdateData};
use super::write_batch::WriteBatch;
use crate::error::{TraversalError, TraversalResult};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Decides per document whether the update applies; an error fails the batch
pub type UpdatePredicate<D> = Arc<dyn Fn(&D) -> anyhow::Result<bool> + Send + Sync>;

/// Computes the update data for one document; an error fails the batch
pub type UpdateDataGetter<D> = Arc<dyn Fn(&D) -> anyhow::Result<UpdateData> + Send + Sync>;

/// Wrap an infallible predicate
pub fn predicate_fn<D, P>(predicate: P) -> UpdatePredicate<D>
where
    D: 'static,
    P: Fn(&D) -> bool + Send + Sync + 'static,
{
    Arc::new(move |doc: &D| -> anyhow::Result<bool> { Ok(predicate(doc)) })
}

/// Wrap an infallible getter
pub fn getter_fn<D, G>(getter: G) -> UpdateDataGetter<D>
where
    D: 'static,
    G: Fn(&D) -> UpdateData + Send + Sync + 'static,
{
    Arc::new(move |doc: &D| -> anyhow::Result<UpdateData> { Ok(getter(doc)) })
}

pub enum UpdateRequest<D> {
    /// Apply the same update data to every matching document
    Data {
        data: UpdateData,
        predicate: Option<UpdatePredicate<D>>,
    },
    /// Set one field on every matching document
    Field {
        path: FieldPath,
        value: Value,
        predicate: Option<UpdatePredicate<D>>,
    },
    /// Apply update data computed from each matching document
    Computed {
        getter: UpdateDataGetter<D>,
        predicate: Option<UpdatePredicate<D>>,
    },
}

impl<D> UpdateRequest<D> {
    pub fn data(data: UpdateData) -> Self {
        UpdateRequest::Data {
            data,
            predicate: None,
        }
    }

    pub fn field(path: impl Into<FieldPath>, value: impl Into<Value>) -> Self {
        UpdateRequest::Field {
            path: path.into(),
            value: value.into(),
            predicate: None,
        }
    }

    pub fn computed<G>(getter: G) -> Self
    where
        G: Fn(&D) -> UpdateData + Send + Sync + 'static,
        D: 'static,
    {
        UpdateRequest::Computed {
            getter: getter_fn(getter),
            predicate: None,
        }
    }

    /// Computed form whose getter may fail
    pub fn try_computed<G>(getter: G) -> Self
    where
        G: Fn(&D) -> anyhow::Result<UpdateData> + Send + Sync + 'static,
    {
        UpdateRequest::Computed {
            getter: Arc::new(getter),
            predicate: None,
        }
    }

    /// Only update documents for which `predicate` returns `true`
    pub fn when<P>(self, predicate: P) -> Self
    where
        P: Fn(&D) -> bool + Send + Sync + 'static,
        D: 'static,
    {
        self.with_predicate(Some(predicate_fn(predicate)))
    }

    /// Like [`when`](Self::when), for predicates that can fail
    pub fn try_when<P>(self, predicate: P) -> Self
    where
        P: Fn(&D) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        self.with_predicate(Some(Arc::new(predicate)))
    }

    pub fn with_predicate(self, predicate: Option<UpdatePredicate<D>>) -> Self {
        match self {
            UpdateRequest::Data { data, .. } => UpdateRequest::Data { data, predicate },
            UpdateRequest::Field { path, value, .. } => UpdateRequest::Field {
                path,
                value,
                predicate,
            },
            UpdateRequest::Computed { getter, .. } => UpdateRequest::Computed { getter, predicate },
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            UpdateRequest::Data { .. } => "data",
            UpdateRequest::Field { .. } => "field",
            UpdateRequest::Computed { .. } => "computed",
        }
    }

    pub fn has_predicate(&self) -> bool {
        match self {
            UpdateRequest::Data { predicate, .. }
            | UpdateRequest::Field { predicate, .. }
            | UpdateRequest::Computed { predicate, .. } => predicate.is_some(),
        }
    }

    /// Validate the request and turn it into the per-document mutation
    pub fn resolve(self) -> TraversalResult<DocumentMutation<D>> {
        let (strategy, predicate) = match self {
            UpdateRequest::Data { data, predicate } => {
                if data.is_empty() {
                    return Err(TraversalError::validation(
                        "update data must be a non-empty object",
                    ));
                }
                for key in data.keys() {
                    FieldPath::from(key.as_str()).validate()?;
                }
                (MutationStrategy::Merge(data), predicate)
            }
            UpdateRequest::Field {
                path,
                value,
                predicate,
            } => {
                path.validate()?;
                (MutationStrategy::SetField(path, value), predicate)
            }
            UpdateRequest::Computed { getter, predicate } => {
                (MutationStrategy::Computed(getter), predicate)
            }
        };
        Ok(DocumentMutation {
            strategy,
            predicate,
        })
    }
}

impl<D> fmt::Debug for UpdateRequest<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("UpdateRequest");
        debug.field("kind", &self.kind());
        match self {
            UpdateRequest::Data { data, .. } => debug.field("data", data),
            UpdateRequest::Field { path, value, .. } => {
                debug.field("path", path).field("value", value)
            }
            UpdateRequest::Computed { .. } => &mut debug,
        };
        debug.field("has_predicate", &self.has_predicate()).finish()
    }
}

/// One loosely typed positional argument to an update call
pub enum UpdateArg<D> {
    /// A plain value: update data object, field name or field value
    Value(Value),
    /// An explicit field path
    Path(FieldPath),
    Getter(UpdateDataGetter<D>),
    Predicate(UpdatePredicate<D>),
}

impl<D> UpdateArg<D> {
    pub fn value(value: impl Into<Value>) -> Self {
        UpdateArg::Value(value.into())
    }

    pub fn getter<G>(getter: G) -> Self
    where
        G: Fn(&D) -> UpdateData + Send + Sync + 'static,
        D: 'static,
    {
        UpdateArg::Getter(getter_fn(getter))
    }

    pub fn predicate<P>(predicate: P) -> Self
    where
        P: Fn(&D) -> bool + Send + Sync + 'static,
        D: 'static,
    {
        UpdateArg::Predicate(predicate_fn(predicate))
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, UpdateArg::Getter(_) | UpdateArg::Predicate(_))
    }

    fn describe(&self) -> &'static str {
        match self {
            UpdateArg::Value(Value::Object(_)) => "object",
            UpdateArg::Value(Value::String(_)) => "string",
            UpdateArg::Value(_) => "value",
            UpdateArg::Path(_) => "field path",
            UpdateArg::Getter(_) => "getter",
            UpdateArg::Predicate(_) => "predicate",
        }
    }

    fn into_field_path(self) -> Option<FieldPath> {
        match self {
            UpdateArg::Value(Value::String(name)) => Some(FieldPath::from(name)),
            UpdateArg::Path(path) => Some(path),
            _ => None,
        }
    }

    fn is_field_like(&self) -> bool {
        matches!(self, UpdateArg::Value(Value::String(_)) | UpdateArg::Path(_))
    }
}

impl<D> From<Value> for UpdateArg<D> {
    fn from(value: Value) -> Self {
        UpdateArg::Value(value)
    }
}

impl<D> From<FieldPath> for UpdateArg<D> {
    fn from(path: FieldPath) -> Self {
        UpdateArg::Path(path)
    }
}

impl<D> From<UpdateData> for UpdateArg<D> {
    fn from(data: UpdateData) -> Self {
        UpdateArg::Value(Value::Object(data))
    }
}

/// Resolve positional update arguments into an [`UpdateRequest`]
pub fn resolve_update_args<D>(args: Vec<UpdateArg<D>>) -> TraversalResult<UpdateRequest<D>> {
    let arg_count = args.len();
    if arg_count == 0 || arg_count > 3 {
        return Err(TraversalError::validation(format!(
            "update expects 1 to 3 arguments, got {arg_count}"
        )));
    }

    let mut args = args.into_iter();
    let first = args.next().ok_or_else(|| TraversalError::validation("missing first argument"))?;
    let second = args.next();
    let third = args.next();

    if first.is_callable() {
        let getter = match first {
            UpdateArg::Getter(getter) => getter,
            other => {
                return Err(TraversalError::validation(format!(
                    "a callable first argument must be an update data getter, got {}",
                    other.describe()
                )))
            }
        };
        if third.is_some() {
            return Err(TraversalError::validation(
                "the getter form accepts at most a predicate after the getter",
            ));
        }
        let predicate = optional_predicate(second)?;
        return Ok(UpdateRequest::Computed { getter, predicate });
    }

    let second_is_callable = second.as_ref().is_some_and(UpdateArg::is_callable);
    let field_form = (arg_count == 2 && !second_is_callable)
        || (arg_count == 3
            && first.is_field_like()
            && !second_is_callable
            && matches!(third, Some(UpdateArg::Predicate(_))));

    if field_form {
        let described = first.describe();
        let path = first.into_field_path().ok_or_else(|| {
            TraversalError::validation(format!(
                "the field/value form needs a field name or path first, got {described}"
            ))
        })?;
        let value = match second {
            Some(UpdateArg::Value(value)) => value,
            Some(other) => {
                return Err(TraversalError::validation(format!(
                    "field value must be a plain value, got {}",
                    other.describe()
                )))
            }
            None => return Err(TraversalError::validation("missing field value")),
        };
        let predicate = optional_predicate(third)?;
        return Ok(UpdateRequest::Field {
            path,
            value,
            predicate,
        });
    }

    let data = match first {
        UpdateArg::Value(Value::Object(data)) => data,
        other => {
            return Err(TraversalError::validation(format!(
                "update data must be an object, got {}",
                other.describe()
            )))
        }
    };
    if third.is_some() {
        return Err(TraversalError::validation(
            "the update data form accepts at most a predicate after the data",
        ));
    }
    let predicate = optional_predicate(second)?;
    Ok(UpdateRequest::Data { data, predicate })
}

fn optional_predicate<D>(arg: Option<UpdateArg<D>>) -> TraversalResult<Option<UpdatePredicate<D>>> {
    match arg {
        None => Ok(None),
        Some(UpdateArg::Predicate(predicate)) => Ok(Some(predicate)),
        Some(other) => Err(TraversalError::validation(format!(
            "expected a predicate, got {}",
            other.describe()
        ))),
    }
}

enum MutationStrategy<D> {
    Merge(UpdateData),
    SetField(FieldPath, Value),
    Computed(UpdateDataGetter<D>),
}

/// The per-document mutation an update request resolves to
pub struct DocumentMutation<D> {
    strategy: MutationStrategy<D>,
    predicate: Option<UpdatePredicate<D>>,
}

impl<D: Document> DocumentMutation<D> {
    /// Stage the mutation for `doc` unless the predicate rejects it
    ///
    /// Returns whether a mutation was staged. Predicate and getter failures are
    /// `Handler` errors for `batch_index`; a rejected stage is a `Stage` error.
    pub fn apply<W>(&self, batch: &mut W, doc: &D, batch_index: usize) -> TraversalResult<bool>
    where
        W: WriteBatch<Ref = D::Ref>,
    {
        let reference = doc.reference();
        let handler_error = |what: &str, e: anyhow::Error| TraversalError::Handler {
            batch_index,
            reason: format!("{what} failed for {reference:?}: {e:#}"),
        };

        if let Some(predicate) = &self.predicate {
            if !predicate(doc).map_err(|e| handler_error("predicate", e))? {
                return Ok(false);
            }
        }

        let staged = match &self.strategy {
            MutationStrategy::Merge(data) => batch.stage_field_merge(&reference, data.clone()),
            MutationStrategy::SetField(path, value) => {
                batch.stage_field_path_update(&reference, path, value.clone())
            }
            MutationStrategy::Computed(getter) => {
                let data = getter(doc).map_err(|e| handler_error("update data getter", e))?;
                if data.is_empty() {
                    Err(anyhow::anyhow!("computed update data for {reference:?} is empty"))
                } else {
                    batch.stage_field_merge(&reference, data)
                }
            }
        };
        staged.map_err(|e| TraversalError::Stage {
            batch_index,
            reason: format!("{e:#}"),
        })?;
        Ok(true)
    }
}
