//! Integration tests for Layer 0: Foundation
//!
//! Tests for entity handles and error types.

mod errors;
