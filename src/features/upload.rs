mod driver;
mod existence;
mod kind;
pub mod message;
mod parser;
mod route;

pub use driver::*;
pub use existence::ResourceExistenceCache;
pub use kind::{Identity, Listing, ResourceKind};
pub use message::*;
pub use parser::{
    parse, DocumentError, ParseError, ParseResult, ParsedResource, SUPPORTED_API_VERSIONS,
};
pub use route::{request_body, resolve_route, route, Route, RoutingError};
