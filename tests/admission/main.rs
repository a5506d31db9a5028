//! End-to-end admission tests.
//!
//! These tests drive the real router the way the API server would,
//! without a Kubernetes cluster: full review envelopes over HTTP.

mod fixtures;
mod router_tests;
