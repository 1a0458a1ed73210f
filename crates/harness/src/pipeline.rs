//! Local pipeline catalogue and row transforms.
//!
//! When the simulator is unreachable, the harness runs pipelines locally:
//! read the source table, apply the registered transform, rewrite the sink
//! table. [`PipelineKind`] maps well-known pipeline names to their table
//! pairs, and [`TransformRegistry`] holds the per-(source, sink) row
//! transform with the built-in three preloaded.

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

use tsunagi_core::types::Row;

/// Well-known pipelines the harness can simulate locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineKind {
    /// Copies `client_dm` into `client_dm_bx`, stamping the BX channel.
    ClientDmToBx,
    /// Copies `point_grant` into `point_grant_email`, keeping only rows
    /// with a usable email address.
    PointGrantEmail,
    /// Copies `payment` into `payment_alert`, keeping overdue rows and
    /// grading them by amount.
    PaymentAlert,
    /// Anything else; no table pair, simulated as an immediate success.
    Generic,
}

impl PipelineKind {
    /// Classify a pipeline by name.
    pub fn from_name(name: &str) -> Self {
        match name {
            "client_dm_to_bx" => Self::ClientDmToBx,
            "point_grant_email" => Self::PointGrantEmail,
            "payment_alert" => Self::PaymentAlert,
            _ => Self::Generic,
        }
    }

    /// Source and sink tables for pipelines that copy data.
    pub fn tables(&self) -> Option<(&'static str, &'static str)> {
        match self {
            Self::ClientDmToBx => Some(("client_dm", "client_dm_bx")),
            Self::PointGrantEmail => Some(("point_grant", "point_grant_email")),
            Self::PaymentAlert => Some(("payment", "payment_alert")),
            Self::Generic => None,
        }
    }
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ClientDmToBx => "client_dm_to_bx",
            Self::PointGrantEmail => "point_grant_email",
            Self::PaymentAlert => "payment_alert",
            Self::Generic => "generic",
        };
        write!(f, "{name}")
    }
}

/// Row transform applied between reading a source and writing a sink.
pub type Transform = Box<dyn Fn(&[Row]) -> Vec<Row> + Send + Sync>;

/// Stamp every row with the BX distribution channel.
pub fn client_dm_to_bx(rows: &[Row]) -> Vec<Row> {
    rows.iter()
        .map(|row| {
            let mut out = row.clone();
            out.insert("dm_channel".to_owned(), Value::String("BX".to_owned()));
            out
        })
        .collect()
}

/// Keep only rows whose `email` column holds a non-empty string.
pub fn point_grant_email(rows: &[Row]) -> Vec<Row> {
    rows.iter()
        .filter(|row| {
            matches!(row.get("email"), Some(Value::String(email)) if !email.is_empty())
        })
        .cloned()
        .collect()
}

/// Threshold above which an overdue payment is flagged HIGH.
const HIGH_ALERT_AMOUNT: f64 = 10_000.0;

/// Keep overdue payments and grade each one by amount.
pub fn payment_alert(rows: &[Row]) -> Vec<Row> {
    rows.iter()
        .filter(|row| {
            matches!(row.get("status"), Some(Value::String(status)) if status == "OVERDUE")
        })
        .map(|row| {
            let amount = row.get("amount").and_then(Value::as_f64).unwrap_or(0.0);
            let level = if amount >= HIGH_ALERT_AMOUNT {
                "HIGH"
            } else {
                "NORMAL"
            };
            let mut out = row.clone();
            out.insert("alert_level".to_owned(), Value::String(level.to_owned()));
            out
        })
        .collect()
}

/// Registry of row transforms keyed by (source, sink) table pair.
///
/// Unregistered pairs pass rows through unchanged, so a plain copy needs
/// no setup.
pub struct TransformRegistry {
    transforms: HashMap<(String, String), Transform>,
}

impl TransformRegistry {
    /// Empty registry; every copy is a passthrough.
    pub fn new() -> Self {
        Self {
            transforms: HashMap::new(),
        }
    }

    /// Registry preloaded with the built-in pipeline transforms.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("client_dm", "client_dm_bx", client_dm_to_bx);
        registry.register("point_grant", "point_grant_email", point_grant_email);
        registry.register("payment", "payment_alert", payment_alert);
        registry
    }

    /// Register a transform for a table pair, replacing any existing one.
    pub fn register<F>(&mut self, source: &str, sink: &str, transform: F)
    where
        F: Fn(&[Row]) -> Vec<Row> + Send + Sync + 'static,
    {
        self.transforms
            .insert((source.to_owned(), sink.to_owned()), Box::new(transform));
    }

    /// Whether a transform is registered for this pair.
    pub fn contains(&self, source: &str, sink: &str) -> bool {
        self.transforms
            .contains_key(&(source.to_owned(), sink.to_owned()))
    }

    /// Apply the registered transform, or pass rows through unchanged.
    pub fn apply(&self, source: &str, sink: &str, rows: &[Row]) -> Vec<Row> {
        match self
            .transforms
            .get(&(source.to_owned(), sink.to_owned()))
        {
            Some(transform) => transform(rows),
            None => rows.to_vec(),
        }
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformRegistry")
            .field("pairs", &self.transforms.keys().collect::<Vec<_>>())
            .finish()
    }
}
