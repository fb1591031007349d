#![forbid(unsafe_code)]

//! Reference host for exercising scopebind end to end.
//!
//! Provides a minimal dirty-checking environment: hierarchical scopes with a
//! digest loop and post-digest queue, a small expression language with
//! `{{expr}}` templates, element attributes with observers, and a component
//! that records every change hook call.
//!
//! # Example
//!
//! ```
//! use scopebind::{BindingDeclarations, BindingMetadata, Scope, Value};
//! use scopebind_harness::{HarnessAttributes, HarnessHost, RecordingComponent};
//!
//! let host = HarnessHost::new();
//! host.root.set("user", Value::from("ada"));
//!
//! let metadata = BindingMetadata::component("greeter", BindingDeclarations::new().input("name", "<"));
//! let attrs = HarnessAttributes::new().with_text("name", "user");
//! let mounted = host.mount(RecordingComponent::new("greeter"), &metadata, attrs, true).unwrap();
//!
//! assert_eq!(mounted.component.borrow().field("name"), Value::from("ada"));
//! host.apply(|root| root.set("user", Value::from("bob")));
//! assert_eq!(mounted.component.borrow().notifications().len(), 1);
//! ```

pub mod attributes;
pub mod component;
pub mod host;
pub mod parser;
pub mod scope;

pub use attributes::HarnessAttributes;
pub use component::{Journal, Reaction, RecordingComponent};
pub use host::{HarnessHost, Mounted};
pub use parser::{HarnessExpression, HarnessParser, HarnessTemplate};
pub use scope::{DIGEST_TTL, DigestReport, HarnessScope};
