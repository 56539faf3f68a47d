//! HTTP/1.1 plumbing for the proxy listener and the forwarding engine.
//!
//! # Architecture
//!
//! - **`connection`**: per-client request/response state machine
//! - **`parser`**: parses requests (and chunked bodies) from byte buffers
//! - **`headers`**: ordered, case-insensitive header list
//! - **`request`**: HTTP request representation
//! - **`response`**: HTTP response representation with builder pattern
//! - **`writer`**: serializes and writes responses to the client
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌─────────────┐
//!        │   Reading   │ ← Wait for a complete request (headers + body)
//!        └──────┬──────┘
//!               │ Request received
//!               ▼
//!        ┌──────────────────┐
//!        │   Processing     │ ← Run the proxy pipeline, watch for hang-up
//!        └──────┬───────────┘
//!               │ Response ready
//!               ▼
//!        ┌──────────────────┐
//!        │    Writing       │ ← Send response to client
//!        └──────┬───────────┘
//!               │ Response sent
//!               ├─ Keep-Alive → Reading (same connection)
//!               └─ Close → Closed
//! ```
//!
//! Malformed requests skip Processing and go straight to Writing a 400 (or
//! 413 for oversized bodies) followed by Closed.

pub mod connection;
pub mod headers;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
