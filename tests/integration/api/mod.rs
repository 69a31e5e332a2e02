//! HTTP surface tests

mod router_test;
