//! Alert taxonomy for boolean operations.
//!
//! Warnings describe degradations the operation survived (a skipped
//! intersection pair, an approximated section curve). Errors describe
//! conditions that invalidate part or all of the result. Fatal conditions
//! abort the run and surface as [`BooleanError`].

use thiserror::Error;

/// What happened. Each kind has a fixed severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    /// An intersection pair did not converge; the pair was skipped.
    IntersectionNotConverged,
    /// A split edge came out shorter than its end vertex tolerances; it
    /// was kept, but downstream classification may be unstable.
    TooSmallEdge,
    /// A section curve had no analytic form and was approximated by a
    /// polyline.
    SectionApproximated,
    /// A face's split wires could not be closed; the face was kept unsplit.
    UnclosableWire,
    /// A split face had no usable interior sample point and could not be
    /// classified; it was treated as outside both operands.
    DegenerateFace,
    /// The selector kept no faces; the result is empty.
    EmptyResult,
}

/// Severity of an alert kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Result is usable; something was degraded.
    Warning,
    /// Part of the result is invalid.
    Error,
}

impl AlertKind {
    /// The fixed severity of this kind.
    pub fn severity(self) -> Severity {
        match self {
            AlertKind::IntersectionNotConverged
            | AlertKind::TooSmallEdge
            | AlertKind::SectionApproximated
            | AlertKind::DegenerateFace
            | AlertKind::EmptyResult => Severity::Warning,
            AlertKind::UnclosableWire => Severity::Error,
        }
    }
}

/// One alert: a kind, the DS shape index it concerns (if any), and a
/// human-readable message.
#[derive(Debug, Clone)]
pub struct Alert {
    /// What happened.
    pub kind: AlertKind,
    /// DS index of the shape concerned, if the alert is about one shape.
    pub shape: Option<usize>,
    /// Free-form detail.
    pub message: String,
}

/// An ordered collection of alerts from one run.
///
/// Alerts never drive control flow between stages; they are collected and
/// handed back with the result.
#[derive(Debug, Clone, Default)]
pub struct AlertList {
    alerts: Vec<Alert>,
}

impl AlertList {
    /// Empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an alert.
    pub fn add(&mut self, kind: AlertKind, shape: Option<usize>, message: impl Into<String>) {
        self.alerts.push(Alert {
            kind,
            shape,
            message: message.into(),
        });
    }

    /// Append all alerts from `other`.
    pub fn merge(&mut self, other: AlertList) {
        self.alerts.extend(other.alerts);
    }

    /// Iterate over the alerts in the order recorded.
    pub fn iter(&self) -> impl Iterator<Item = &Alert> {
        self.alerts.iter()
    }

    /// True if any alert of the given kind was recorded.
    pub fn has(&self, kind: AlertKind) -> bool {
        self.alerts.iter().any(|a| a.kind == kind)
    }

    /// True if any error-severity alert was recorded.
    pub fn has_errors(&self) -> bool {
        self.alerts
            .iter()
            .any(|a| a.kind.severity() == Severity::Error)
    }

    /// True if any warning-severity alert was recorded.
    pub fn has_warnings(&self) -> bool {
        self.alerts
            .iter()
            .any(|a| a.kind.severity() == Severity::Warning)
    }

    /// Number of alerts.
    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    /// True if no alerts were recorded.
    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }
}

/// Fatal failures. These abort the run; nothing partial is returned.
#[derive(Debug, Error)]
pub enum BooleanError {
    /// Fewer than two operands were supplied.
    #[error("boolean operation needs at least 2 operands, got {0}")]
    TooFewOperands(usize),

    /// An operand intersects itself; its topology cannot be paved.
    #[error("operand {operand} is self-intersecting")]
    SelfIntersection {
        /// Zero-based operand index.
        operand: usize,
    },

    /// The run was cancelled through its [`CancelToken`].
    ///
    /// [`CancelToken`]: crate::settings::CancelToken
    #[error("operation aborted")]
    Aborted,
}

/// Result alias for fallible kernel operations.
pub type Result<T> = std::result::Result<T, BooleanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_split() {
        assert_eq!(
            AlertKind::IntersectionNotConverged.severity(),
            Severity::Warning
        );
        assert_eq!(AlertKind::UnclosableWire.severity(), Severity::Error);
    }

    #[test]
    fn test_alert_list_queries() {
        let mut list = AlertList::new();
        assert!(list.is_empty());
        list.add(AlertKind::TooSmallEdge, Some(3), "edge 3 below tolerance");
        assert!(list.has(AlertKind::TooSmallEdge));
        assert!(list.has_warnings());
        assert!(!list.has_errors());
        list.add(AlertKind::UnclosableWire, Some(7), "face 7 wires open");
        assert!(list.has_errors());
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_merge_preserves_order() {
        let mut a = AlertList::new();
        a.add(AlertKind::TooSmallEdge, None, "first");
        let mut b = AlertList::new();
        b.add(AlertKind::EmptyResult, None, "second");
        a.merge(b);
        let kinds: Vec<_> = a.iter().map(|al| al.kind).collect();
        assert_eq!(kinds, vec![AlertKind::TooSmallEdge, AlertKind::EmptyResult]);
    }
}
