//! Cookie-based JWT authentication at the gateway edge.
//!
//! Requests carry an `access_token` cookie. The gate verifies it against the
//! access key, forwards the caller as `member-id`, or answers with the JSON
//! error envelope. Throttling keys are derived independently of the outcome.

mod client_key;
mod cookie;
mod errors;
mod gate;
mod ip;

pub use client_key::{ClientKey, ClientKeyResolver, resolve_client_key};
pub use cookie::{CookieJar, extract_access_token};
pub use errors::{EdgeFailure, ErrorKind};
pub use gate::{AuthOutcome, MEMBER_ID_HEADER, authenticate, require_access_token};
pub use ip::{ClientIpHeader, HasHeadersAndExtensions, extract_client_ip};
