pub mod body;
pub mod propagate;
pub mod request_context;

pub use body::ContextBody;
pub use propagate::{
    inject_headers, PropagateContextLayer, PropagateContextService, RequestBuilderExt,
};
pub use request_context::{RequestContextLayer, RequestContextService};
