//! The SIP data model: URIs, headers, and the Request/Response message types.

pub mod address;
pub mod header;
pub mod header_name;
pub mod message;
pub mod method;
pub mod params;
pub mod status;
pub mod uri;
pub mod via;

pub use address::Address;
pub use header::{HeaderList, HeaderValue};
pub use header_name::HeaderName;
pub use message::{
    Message, Origin, Request, RequestBuilder, Response, ResponseBuilder, DEFAULT_MAX_FORWARDS,
};
pub use method::Method;
pub use params::{Param, ParamList};
pub use status::StatusCode;
pub use uri::{Scheme, Uri};
pub use via::Via;
