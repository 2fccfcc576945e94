//! # Hermes Dispatch
//!
//! The orchestrating half of Hermes: owns the route table, runs each
//! matched request through a fixed pipeline and shapes the result.
//!
//! ```text
//! Request
//!   -> pre_dispatch hooks          (may replace the result)
//!   -> match                       (first route + endpoint in order)
//!   -> pipeline                    (bind, sanitize, defaults, validate,
//!                                   permission, post_match, invoke)
//!   -> normalize                   (Failure -> failure_to_response)
//!   -> post_dispatch               (Allow header, response filters)
//! Response
//! ```
//!
//! The serving layer then asks a [`ResponseShaper`] for public data,
//! optionally embedding links or enveloping the response.
//!
//! Registering a namespace for the first time also registers its discovery
//! index at `/{namespace}`; the root index lives at `/`.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod discovery;
mod dispatcher;
mod hooks;
pub mod pipeline;
mod shaper;

pub use dispatcher::{failure_to_response, Dispatcher, DispatcherBuilder, DispatcherConfig};
pub use hooks::{response_filter, DispatchHook, Flow, ResponseFilter};
pub use pipeline::Stage;
pub use shaper::{headers_to_value, ResponseShaper};
