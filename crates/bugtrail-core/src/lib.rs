//! bugtrail-core - element identification for error reports
//!
//! Host-independent pieces shared by the recorder:
//!
//! - **element**: the [`Element`] handle abstraction and an owned snapshot
//! - **identify**: priority-ranked, human-readable element identifiers
//! - **selector**: compound selectors used by custom sanitize patterns
//! - **error**: structured errors with machine-readable codes

pub mod element;
pub mod error;
pub mod identify;
pub mod selector;

pub use element::{ComponentInfo, ComponentResolver, Element, ElementSnapshot, EmbeddedComponents, SiblingPosition};
pub use error::{Error, ErrorCode, Result};
pub use identify::{identify, ElementIdentity};
pub use selector::Selector;

pub mod prelude {
    pub use crate::element::{ComponentInfo, ComponentResolver, Element, ElementSnapshot, EmbeddedComponents};
    pub use crate::error::{Error, ErrorCode, Result};
    pub use crate::identify::{identify, ElementIdentity};
    pub use crate::selector::Selector;
}
