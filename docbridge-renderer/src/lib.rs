//! # docbridge-renderer
//!
//! Converts Markdown documentation into the single-line plain text the BI
//! platform's description fields accept.
//!
//! ## Usage
//!
//! ```rust
//! use docbridge_renderer::render_plain_text;
//!
//! assert_eq!(render_plain_text("**Orders** table"), "Orders table");
//! ```

pub mod plain;

pub use plain::render_plain_text;
