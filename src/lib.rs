//! The library code for the `postshell` site builder. A site is a single
//! content directory of markdown posts, and each post is rendered into an
//! HTML page alongside it. The work breaks down into a few small steps:
//!
//! 1. Finding the source documents ([`crate::document`])
//! 2. Converting each one to HTML ([`crate::convert`])
//! 3. Wrapping the HTML in a document shell with a title and an embedded
//!    stylesheet ([`crate::title`], [`crate::shell`])
//! 4. Optionally rewriting the canonical site URL into a local `file://` URL
//!    for offline preview ([`crate::rewrite`])
//!
//! [`crate::build`] runs steps 1-3 over a thread pool and [`crate::site`]
//! combines everything into the build profiles exposed by the binary.

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod build;
pub mod config;
pub mod convert;
pub mod document;
pub mod rewrite;
pub mod shell;
pub mod site;
pub mod title;
