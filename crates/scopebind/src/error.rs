//! Errors raised by binding installation, synchronization and flushing.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Non-assignable two-way target | Component-side change on a read-only expression | Local state reset to parent value, then `NonAssignable` |
//! | Evaluator failure | Host expression raised | Propagated to the host cycle |
//! | Interpolation failure | Host interpolation raised | Propagated to the host cycle |
//! | Runaway change hooks | Flush nested, or one hook re-delivered, more than `flush_ttl` times | Queued deliveries abandoned, `InfiniteChangeLoop` |
//! | Component busy | Installation or delivery while the component is borrowed | `ComponentBusy` |
//! | Bad configuration | Unparseable or invalid config | `Config` |

/// Errors from scopebind operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingError {
    /// A two-way binding tried to write back to an expression that cannot be
    /// assigned.
    NonAssignable {
        expression: String,
        attribute: String,
        component: String,
    },
    /// The host failed to evaluate an expression.
    Evaluation { expression: String, message: String },
    /// The host failed to interpolate a template.
    Interpolation { template: String, message: String },
    /// Change hooks kept scheduling new flushes.
    InfiniteChangeLoop { ttl: u32 },
    /// The component was already borrowed when the engine needed exclusive
    /// access to it.
    ComponentBusy,
    /// Configuration or declaration loading failed.
    Config(String),
}

impl std::fmt::Display for BindingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonAssignable {
                expression,
                attribute,
                component,
            } => write!(
                f,
                "expression '{expression}' in attribute '{attribute}' used with '{component}' is non-assignable"
            ),
            Self::Evaluation {
                expression,
                message,
            } => write!(f, "failed to evaluate '{expression}': {message}"),
            Self::Interpolation { template, message } => {
                write!(f, "failed to interpolate '{template}': {message}")
            }
            Self::InfiniteChangeLoop { ttl } => {
                write!(f, "{ttl} change-hook flushes re-entered, aborting")
            }
            Self::ComponentBusy => f.write_str("component is borrowed elsewhere"),
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
        }
    }
}

impl std::error::Error for BindingError {}

/// Result alias for scopebind operations.
pub type Result<T> = std::result::Result<T, BindingError>;
