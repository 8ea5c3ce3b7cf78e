//! Label reconciliation
//!
//! The labels of all configured statuses form the managed universe. At most
//! one of them should be on a pull request at a time; labels outside the
//! universe are never touched.

use std::collections::BTreeSet;
use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::BoxError;

/// A single change to the labels of a pull request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", content = "label", rename_all = "lowercase")]
pub enum LabelOp {
    Add(String),
    Remove(String),
}

impl LabelOp {
    /// The label this operation touches
    pub fn label(&self) -> &str {
        match self {
            LabelOp::Add(l) | LabelOp::Remove(l) => l,
        }
    }

    /// Apply the operation to a local label set
    pub fn apply_to(&self, labels: &mut BTreeSet<String>) {
        match self {
            LabelOp::Add(l) => {
                labels.insert(l.clone());
            }
            LabelOp::Remove(l) => {
                labels.remove(l);
            }
        }
    }
}

impl fmt::Display for LabelOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelOp::Add(l) => write!(f, "add {}", l),
            LabelOp::Remove(l) => write!(f, "remove {}", l),
        }
    }
}

/// Compute the minimal operations that leave only `desired` from `universe`
///
/// The add, if any, comes first; removals follow in label order. With
/// `desired` set to `None` every managed label is removed.
pub fn plan_label_ops(
    applied: &BTreeSet<String>,
    universe: &BTreeSet<String>,
    desired: Option<&str>,
) -> Vec<LabelOp> {
    let mut to_remove: BTreeSet<&String> = applied.intersection(universe).collect();
    let mut ops = Vec::with_capacity(to_remove.len() + 1);

    if let Some(desired) = desired.filter(|d| !d.is_empty()) {
        let already_applied = to_remove
            .iter()
            .find(|l| l.as_str() == desired)
            .copied();

        match already_applied {
            Some(label) => {
                to_remove.remove(label);
            }
            None => ops.push(LabelOp::Add(desired.to_string())),
        }
    }

    ops.extend(to_remove.into_iter().map(|l| LabelOp::Remove(l.clone())));
    ops
}

/// Label access on the review platform
#[async_trait]
pub trait LabelApi: Send + Sync {
    /// Labels currently on the pull request
    async fn list_labels(&self, pr_number: u64) -> Result<Vec<String>, BoxError>;

    /// Add one label
    async fn add_label(&self, pr_number: u64, label: &str) -> Result<(), BoxError>;

    /// Remove one label
    async fn remove_label(&self, pr_number: u64, label: &str) -> Result<(), BoxError>;
}

/// A label operation the platform rejected
#[derive(Debug)]
pub struct LabelOpFailure {
    pub op: LabelOp,
    pub error: BoxError,
}

impl fmt::Display for LabelOpFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.op, self.error)
    }
}

/// Every failure from one batch of label operations
#[derive(Debug, Default)]
pub struct LabelOpErrors {
    pub failures: Vec<LabelOpFailure>,
}

impl LabelOpErrors {
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }
}

impl fmt::Display for LabelOpErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} label operation(s) failed", self.failures.len())?;
        for (i, failure) in self.failures.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{}{}", sep, failure)?;
        }
        Ok(())
    }
}

impl std::error::Error for LabelOpErrors {}

/// Send every operation to the platform
///
/// A failed operation does not stop the ones after it, and successful ones
/// are not rolled back.
pub async fn apply_label_ops<A>(
    api: &A,
    pr_number: u64,
    ops: &[LabelOp],
) -> Result<(), LabelOpErrors>
where
    A: LabelApi + ?Sized,
{
    let mut errors = LabelOpErrors::default();

    for op in ops {
        let result = match op {
            LabelOp::Add(label) => api.add_label(pr_number, label).await,
            LabelOp::Remove(label) => api.remove_label(pr_number, label).await,
        };

        match result {
            Ok(()) => info!(pr_number, op = %op, "Applied label operation"),
            Err(error) => {
                warn!(pr_number, op = %op, error = %error, "Label operation failed");
                errors.failures.push(LabelOpFailure {
                    op: op.clone(),
                    error,
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// In-memory label store that can be told to reject some labels
    #[derive(Debug, Default)]
    pub struct FakeLabels {
        pub labels: Mutex<BTreeSet<String>>,
        pub rejected: BTreeSet<String>,
        pub calls: Mutex<Vec<LabelOp>>,
    }

    impl FakeLabels {
        pub fn with_labels(labels: &[&str]) -> Self {
            Self {
                labels: Mutex::new(labels.iter().map(|s| s.to_string()).collect()),
                ..Self::default()
            }
        }

        pub fn reject(mut self, label: &str) -> Self {
            self.rejected.insert(label.to_string());
            self
        }

        pub fn current(&self) -> BTreeSet<String> {
            self.labels.lock().unwrap().clone()
        }

        fn record(&self, op: LabelOp) -> Result<(), BoxError> {
            self.calls.lock().unwrap().push(op.clone());
            if self.rejected.contains(op.label()) {
                return Err(format!("label {} rejected", op.label()).into());
            }
            op.apply_to(&mut self.labels.lock().unwrap());
            Ok(())
        }
    }

    #[async_trait]
    impl LabelApi for FakeLabels {
        async fn list_labels(&self, _pr_number: u64) -> Result<Vec<String>, BoxError> {
            Ok(self.current().into_iter().collect())
        }

        async fn add_label(&self, _pr_number: u64, label: &str) -> Result<(), BoxError> {
            self.record(LabelOp::Add(label.to_string()))
        }

        async fn remove_label(&self, _pr_number: u64, label: &str) -> Result<(), BoxError> {
            self.record(LabelOp::Remove(label.to_string()))
        }
    }
}
